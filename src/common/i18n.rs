// src/common/i18n.rs

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

pub const DEFAULT_LANGUAGE: &str = "pt";

// Tabelas de mensagens embutidas: (chave, português, inglês)
const MESSAGES: &[(&str, &str, &str)] = &[
    ("error.validation", "Um ou mais campos são inválidos.", "One or more fields are invalid."),
    ("error.email_already_exists", "Este e-mail já está em uso.", "This e-mail is already in use."),
    ("error.invalid_credentials", "E-mail ou senha inválidos.", "Invalid e-mail or password."),
    ("error.invalid_token", "Token de autenticação inválido ou ausente.", "Invalid or missing authentication token."),
    ("error.user_inactive", "Usuário desativado.", "User is deactivated."),
    ("error.user_not_found", "Usuário não encontrado.", "User not found."),
    ("error.permission_denied", "Você não tem permissão para realizar esta ação.", "You are not allowed to perform this action."),
    ("error.cannot_modify_self", "Você não pode rebaixar ou desativar o próprio usuário.", "You cannot demote or deactivate yourself."),
    ("error.wrong_password", "A senha atual está incorreta.", "The current password is incorrect."),
    ("error.client_not_found", "Cliente não encontrado.", "Client not found."),
    ("error.client_cancelled", "O cliente está cancelado.", "The client is cancelled."),
    ("error.invalid_status_transition", "Mudança de status não permitida.", "Status change not allowed."),
    ("error.plan_not_found", "Plano não encontrado.", "Plan not found."),
    ("error.plan_inactive", "O plano está inativo.", "The plan is inactive."),
    ("error.subscription_not_found", "Assinatura não encontrada.", "Subscription not found."),
    ("error.subscription_already_active", "O cliente já possui uma assinatura em vigor.", "The client already has an open subscription."),
    ("error.payment_not_found", "Pagamento não encontrado.", "Payment not found."),
    ("error.invalid_payment_state", "Operação não permitida para o status atual do pagamento.", "Operation not allowed for the current payment status."),
    ("error.transaction_not_found", "Lançamento financeiro não encontrado.", "Financial transaction not found."),
    ("error.invalid_transaction_state", "Operação não permitida para o status atual do lançamento.", "Operation not allowed for the current transaction status."),
    ("error.lead_not_found", "Lead não encontrado.", "Lead not found."),
    ("error.invalid_lead_transition", "Mudança de etapa não permitida.", "Stage change not allowed."),
    ("error.lost_reason_required", "Informe o motivo da perda.", "A lost reason is required."),
    ("error.lead_already_converted", "Este lead já foi convertido em cliente.", "This lead was already converted."),
    ("error.event_not_found", "Evento não encontrado.", "Event not found."),
    ("error.invalid_date_range", "A data final deve ser posterior à inicial.", "The end date must be after the start date."),
    ("error.invalid_webhook_signature", "Assinatura do webhook inválida.", "Invalid webhook signature."),
    ("error.invalid_webhook_payload", "Payload do webhook inválido.", "Invalid webhook payload."),
    ("error.google_not_connected", "Conecte sua conta Google primeiro.", "Connect your Google account first."),
    ("error.integration_not_configured", "Integração não configurada.", "Integration not configured."),
    ("error.integration_failed", "Falha ao comunicar com o serviço externo.", "Failed to reach the external service."),
    ("error.unique_violation", "Registro duplicado.", "Duplicate record."),
    ("error.internal", "Ocorreu um erro inesperado.", "An unexpected error occurred."),
];

static SHARED: LazyLock<I18nStore> = LazyLock::new(I18nStore::load);

// Dicionário de traduções: idioma -> (chave -> mensagem)
#[derive(Clone, Debug)]
pub struct I18nStore {
    messages: Arc<HashMap<&'static str, HashMap<&'static str, &'static str>>>,
}

impl I18nStore {
    fn load() -> Self {
        let mut pt = HashMap::new();
        let mut en = HashMap::new();
        for (key, pt_msg, en_msg) in MESSAGES {
            pt.insert(*key, *pt_msg);
            en.insert(*key, *en_msg);
        }

        let mut messages = HashMap::new();
        messages.insert("pt", pt);
        messages.insert("en", en);

        Self { messages: Arc::new(messages) }
    }

    pub fn shared() -> Self {
        SHARED.clone()
    }

    /// Traduz a chave. Idioma desconhecido cai no português; chave desconhecida volta como está.
    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.messages
            .get(lang)
            .and_then(|table| table.get(key))
            .or_else(|| self.messages.get(DEFAULT_LANGUAGE).and_then(|table| table.get(key)))
            .map(|msg| msg.to_string())
            .unwrap_or_else(|| key.to_string())
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.messages.contains_key(lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_portuguese() {
        let store = I18nStore::shared();
        assert_eq!(store.translate("fr", "error.lead_not_found"), "Lead não encontrado.");
    }

    #[test]
    fn unknown_keys_are_returned_verbatim() {
        assert_eq!(I18nStore::shared().translate("en", "error.nope"), "error.nope");
    }

    #[test]
    fn every_key_exists_in_both_languages() {
        let store = I18nStore::shared();
        for (key, _, en) in MESSAGES {
            assert_eq!(store.translate("en", key), *en);
        }
        assert!(store.supports("pt") && store.supports("en"));
    }
}
