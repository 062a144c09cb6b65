// src/services/ai_service.rs

use std::{fmt::Write as _, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::{ClientRepository, LeadRepository},
    middleware::rbac::DataScope,
    models::{
        ai::{ChatRequest, ChatResponse, ChatRole, ChatTurn},
        auth::User,
        clients::Client as NexusClient,
        leads::Lead,
    },
};

pub const MAX_HISTORY_TURNS: usize = 20;

const SALES_PROMPT: &str = "Você é o assistente de vendas do Gestor Nexus, um sistema de gestão para pequenas empresas. \
Ajude o vendedor a conduzir negociações: sugira abordagens, respostas a objeções e próximos passos. \
Responda sempre em português do Brasil, de forma objetiva e cordial. \
Não invente preços, descontos ou condições que não foram informados.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProviderKind {
    OpenAi,
    Groq,
    Gemini,
}

impl AiProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            AiProviderKind::OpenAi => "gpt-4o-mini",
            AiProviderKind::Groq => "llama-3.1-8b-instant",
            AiProviderKind::Gemini => "gemini-1.5-flash",
        }
    }
}

impl FromStr for AiProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(AiProviderKind::OpenAi),
            "groq" => Ok(AiProviderKind::Groq),
            "gemini" => Ok(AiProviderKind::Gemini),
            other => Err(format!("AI_PROVIDER desconhecido: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub provider: AiProviderKind,
    pub api_key: String,
    pub model: Option<String>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn model(&self) -> &str;
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String, AppError>;
}

// --- Formatos de requisição/resposta ---

pub fn openai_request(model: &str, system: &str, turns: &[ChatTurn]) -> Value {
    let mut messages = vec![json!({ "role": "system", "content": system })];
    messages.extend(turns.iter().map(|turn| {
        let role = match turn.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        json!({ "role": role, "content": turn.content })
    }));
    json!({ "model": model, "messages": messages, "temperature": 0.7 })
}

pub fn extract_openai_reply(body: &Value) -> Option<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn gemini_request(system: &str, turns: &[ChatTurn]) -> Value {
    let contents: Vec<Value> = turns
        .iter()
        .map(|turn| {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": turn.content }] })
        })
        .collect();
    json!({
        "systemInstruction": { "parts": [{ "text": system }] },
        "contents": contents,
    })
}

pub fn extract_gemini_reply(body: &Value) -> Option<String> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

async fn send_json(request: reqwest::RequestBuilder, provider: &str) -> Result<Value, AppError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::IntegrationError(format!("{provider} {}: {body}", status.as_u16())));
    }
    Ok(response.json::<Value>().await?)
}

// --- Provedores ---

/// Chat completions no formato da OpenAI (serve também para a Groq).
pub struct OpenAiCompatibleProvider {
    name: &'static str,
    base_url: String,
    api_key: String,
    model: String,
    http: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &'static str, base_url: &str, api_key: String, model: String, http: Client) -> Self {
        Self { name, base_url: base_url.trim_end_matches('/').to_string(), api_key, model, http }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String, AppError> {
        let request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&openai_request(&self.model, system, turns));

        let body = send_json(request, self.name).await?;
        extract_openai_reply(&body).ok_or_else(|| AppError::IntegrationError(format!("{}: resposta vazia", self.name)))
    }
}

pub struct GeminiProvider {
    api_key: String,
    model: String,
    http: Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, http: Client) -> Self {
        Self { api_key, model, http }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String, AppError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let request = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request(system, turns));

        let body = send_json(request, "gemini").await?;
        extract_gemini_reply(&body).ok_or_else(|| AppError::IntegrationError("gemini: resposta vazia".into()))
    }
}

pub fn build_provider(config: &AiConfig) -> Result<Arc<dyn LlmProvider>, AppError> {
    let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| config.provider.default_model().to_string());
    let api_key = config.api_key.clone();

    let provider: Arc<dyn LlmProvider> = match config.provider {
        AiProviderKind::OpenAi => Arc::new(OpenAiCompatibleProvider::new(
            "openai",
            "https://api.openai.com/v1",
            api_key,
            model,
            http,
        )),
        AiProviderKind::Groq => Arc::new(OpenAiCompatibleProvider::new(
            "groq",
            "https://api.groq.com/openai/v1",
            api_key,
            model,
            http,
        )),
        AiProviderKind::Gemini => Arc::new(GeminiProvider::new(api_key, model, http)),
    };
    Ok(provider)
}

// --- Contexto ---

/// Mantém só as últimas `MAX_HISTORY_TURNS` mensagens.
pub fn truncate_history(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    &history[start..]
}

pub fn build_system_prompt(lead: Option<&Lead>, client: Option<&NexusClient>) -> String {
    let mut prompt = SALES_PROMPT.to_string();

    if let Some(lead) = lead {
        let _ = write!(prompt, "\n\nLead em negociação: {} (etapa {})", lead.name, lead.stage);
        if let Some(company) = &lead.company {
            let _ = write!(prompt, "\nEmpresa: {company}");
        }
        if let Some(value) = lead.estimated_value {
            let _ = write!(prompt, "\nValor estimado: R$ {value}");
        }
        if let Some(source) = &lead.source {
            let _ = write!(prompt, "\nOrigem: {source}");
        }
        if let Some(notes) = &lead.notes {
            let _ = write!(prompt, "\nObservações: {notes}");
        }
    }

    if let Some(client) = client {
        let _ = write!(prompt, "\n\nCliente: {} (status {})", client.name, client.status);
        if let Some(company) = &client.company_name {
            let _ = write!(prompt, "\nEmpresa: {company}");
        }
        if let Some(notes) = &client.notes {
            let _ = write!(prompt, "\nObservações: {notes}");
        }
    }

    prompt
}

#[derive(Clone)]
pub struct AiService {
    pool: PgPool,
    provider: Option<Arc<dyn LlmProvider>>,
    lead_repo: LeadRepository,
    client_repo: ClientRepository,
}

impl AiService {
    pub fn new(
        pool: PgPool,
        provider: Option<Arc<dyn LlmProvider>>,
        lead_repo: LeadRepository,
        client_repo: ClientRepository,
    ) -> Self {
        Self { pool, provider, lead_repo, client_repo }
    }

    pub async fn chat(&self, actor: &User, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let provider = self.provider.as_ref().ok_or(AppError::IntegrationNotConfigured("ai"))?;
        let scope = DataScope::for_portfolio(actor);

        let lead = match request.lead_id {
            Some(id) => {
                let lead = self.lead_repo.find_by_id(&self.pool, id).await?.ok_or(AppError::LeadNotFound)?;
                if !scope.allows(lead.seller_id) {
                    return Err(AppError::LeadNotFound);
                }
                Some(lead)
            }
            None => None,
        };
        let client = match request.client_id {
            Some(id) => {
                let client = self.client_repo.find_by_id(&self.pool, id).await?.ok_or(AppError::ClientNotFound)?;
                if !scope.allows(client.seller_id) {
                    return Err(AppError::ClientNotFound);
                }
                Some(client)
            }
            None => None,
        };

        let system = build_system_prompt(lead.as_ref(), client.as_ref());
        let mut turns = truncate_history(&request.history).to_vec();
        turns.push(ChatTurn { role: ChatRole::User, content: request.message.trim().to_string() });

        let reply = provider.complete(&system, &turns).await.inspect_err(|e| {
            tracing::warn!(provider = provider.name(), error = %e, "Falha no provedor de IA");
        })?;

        tracing::debug!(provider = provider.name(), user_id = %actor.id, turns = turns.len(), "Resposta de IA gerada");

        Ok(ChatResponse {
            reply,
            provider: provider.name().to_string(),
            model: provider.model().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::leads::LeadStage;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn turn(role: ChatRole, content: &str) -> ChatTurn {
        ChatTurn { role, content: content.into() }
    }

    #[test]
    fn provider_kind_parses_config_values() {
        assert_eq!("OpenAI".parse::<AiProviderKind>().unwrap(), AiProviderKind::OpenAi);
        assert_eq!(" groq ".parse::<AiProviderKind>().unwrap(), AiProviderKind::Groq);
        assert!("claude".parse::<AiProviderKind>().is_err());
    }

    #[test]
    fn history_keeps_the_latest_turns() {
        let history: Vec<ChatTurn> = (0..25).map(|i| turn(ChatRole::User, &i.to_string())).collect();
        let kept = truncate_history(&history);

        assert_eq!(kept.len(), MAX_HISTORY_TURNS);
        assert_eq!(kept[0].content, "5");
        assert_eq!(truncate_history(&history[..3]).len(), 3);
    }

    #[test]
    fn openai_request_prepends_the_system_prompt() {
        let body = openai_request("gpt-4o-mini", "sys", &[turn(ChatRole::User, "oi"), turn(ChatRole::Assistant, "olá")]);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["role"], "assistant");
    }

    #[test]
    fn gemini_request_maps_assistant_to_model() {
        let body = gemini_request("sys", &[turn(ChatRole::Assistant, "olá")]);
        assert_eq!(body["contents"][0]["role"], "model");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
    }

    #[test]
    fn replies_are_extracted_from_provider_bodies() {
        let openai = json!({ "choices": [{ "message": { "role": "assistant", "content": " Proposta! " } }] });
        assert_eq!(extract_openai_reply(&openai).as_deref(), Some("Proposta!"));

        let gemini = json!({ "candidates": [{ "content": { "parts": [{ "text": "Parte 1. " }, { "text": "Parte 2." }] } }] });
        assert_eq!(extract_gemini_reply(&gemini).as_deref(), Some("Parte 1. Parte 2."));

        assert!(extract_openai_reply(&json!({ "choices": [] })).is_none());
        assert!(extract_gemini_reply(&json!({})).is_none());
    }

    #[test]
    fn system_prompt_includes_lead_context() {
        let lead = Lead {
            id: Uuid::new_v4(),
            name: "Mercado Bom Preço".into(),
            email: None,
            phone: None,
            company: Some("Bom Preço Ltda".into()),
            source: None,
            stage: LeadStage::Negociacao,
            estimated_value: Some(Decimal::new(120000, 2)),
            seller_id: None,
            lost_reason: None,
            client_id: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let prompt = build_system_prompt(Some(&lead), None);
        assert!(prompt.starts_with(SALES_PROMPT));
        assert!(prompt.contains("Mercado Bom Preço (etapa NEGOCIACAO)"));
        assert!(prompt.contains("R$ 1200.00"));
    }
}
