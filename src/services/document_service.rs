// src/services/document_service.rs

use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, PaymentRepository, SettingsRepository},
    models::finance::{Payment, PaymentMethod, PaymentStatus},
};

/// Valor em reais no formato brasileiro: `R$ 1.234,56`.
pub fn format_brl(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (integer, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{}R$ {},{}", if negative { "-" } else { "" }, grouped, cents)
}

/// Número curto do recibo (primeiros 8 caracteres do id).
pub fn receipt_number(payment: &Payment) -> String {
    payment.id.simple().to_string()[..8].to_uppercase()
}

fn method_label(method: Option<PaymentMethod>) -> &'static str {
    match method {
        Some(PaymentMethod::Pix) => "PIX",
        Some(PaymentMethod::Boleto) => "Boleto",
        Some(PaymentMethod::CartaoCredito) => "Cartão de crédito",
        Some(PaymentMethod::Dinheiro) => "Dinheiro",
        Some(PaymentMethod::Transferencia) => "Transferência",
        None => "Não informado",
    }
}

fn pdf_error(e: impl std::fmt::Display) -> AppError {
    AppError::InternalServerError(anyhow::Error::msg(e.to_string()))
}

pub struct Receipt {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct DocumentService {
    pool: PgPool,
    payment_repo: PaymentRepository,
    client_repo: ClientRepository,
    settings_repo: SettingsRepository,
    fonts_dir: String,
}

impl DocumentService {
    pub fn new(
        pool: PgPool,
        payment_repo: PaymentRepository,
        client_repo: ClientRepository,
        settings_repo: SettingsRepository,
        fonts_dir: String,
    ) -> Self {
        Self { pool, payment_repo, client_repo, settings_repo, fonts_dir }
    }

    /// Recibo em PDF de um pagamento confirmado.
    pub async fn generate_receipt(&self, payment_id: Uuid) -> Result<Receipt, AppError> {
        // 1. Busca os Dados
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or(AppError::PaymentNotFound)?;
        if payment.status != PaymentStatus::Confirmado {
            return Err(AppError::InvalidPaymentState(payment.status.to_string()));
        }
        let client = self
            .client_repo
            .find_by_id(&self.pool, payment.client_id)
            .await?
            .ok_or(AppError::ClientNotFound)?;
        let settings = self.settings_repo.get_settings().await?;

        // 2. Configura o PDF
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None)
            .map_err(|_| AppError::FontNotFound(format!("Fonte Roboto não encontrada em {}", self.fonts_dir)))?;

        let number = receipt_number(&payment);
        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(format!("Recibo {number}"));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        // --- CABEÇALHO ---
        let company = settings.company_name.clone().unwrap_or_else(|| "GESTOR NEXUS".to_string());
        doc.push(elements::Paragraph::new(company).styled(style::Style::new().bold().with_font_size(18)));
        if let Some(doc_num) = &settings.document_number {
            doc.push(elements::Paragraph::new(format!("CNPJ/CPF: {doc_num}")).styled(style::Style::new().with_font_size(10)));
        }
        doc.push(elements::Break::new(1.5));

        doc.push(
            elements::Paragraph::new(format!("RECIBO DE PAGAMENTO Nº {number}"))
                .styled(style::Style::new().bold().with_font_size(14)),
        );
        doc.push(elements::Break::new(1));

        // --- DADOS ---
        let mut table = elements::TableLayout::new(vec![2, 5]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));
        let bold = style::Style::new().bold();

        let paid_at = payment
            .paid_at
            .map(|d| d.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut rows = vec![
            ("Cliente", client.name.clone()),
            ("Referente a", payment.description.clone()),
            ("Vencimento", payment.due_date.format("%d/%m/%Y").to_string()),
            ("Pago em", paid_at),
            ("Forma de pagamento", method_label(payment.method).to_string()),
        ];
        if let Some(document) = &client.document {
            rows.insert(1, ("CPF/CNPJ", document.clone()));
        }

        for (label, value) in rows {
            table
                .row()
                .element(elements::Paragraph::new(label).styled(bold))
                .element(elements::Paragraph::new(value))
                .push()
                .map_err(pdf_error)?;
        }
        doc.push(table);
        doc.push(elements::Break::new(2));

        // --- TOTAL ---
        let mut total = elements::Paragraph::new(format!("VALOR PAGO: {}", format_brl(payment.amount)));
        total.set_alignment(genpdf::Alignment::Right);
        doc.push(total.styled(style::Style::new().bold().with_font_size(12)));
        doc.push(elements::Break::new(2));

        // --- PIX (QR CODE) ---
        if let Some(key) = settings.pix_key.as_deref().filter(|k| !k.trim().is_empty()) {
            doc.push(elements::Paragraph::new("PAGAMENTOS VIA PIX").styled(style::Style::new().bold().with_font_size(12)));
            doc.push(elements::Paragraph::new(format!("Chave: {key}")));
            doc.push(elements::Break::new(1));

            // QR Code com a chave em texto (não é o BR Code completo)
            let code = QrCode::new(key.as_bytes()).map_err(pdf_error)?;
            let image_buffer = code.render::<Luma<u8>>().build();
            let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);

            let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
                .map_err(pdf_error)?
                .with_scale(genpdf::Scale::new(0.5, 0.5));
            doc.push(pdf_image);
        }

        // --- RODAPÉ ---
        let footer: Vec<&str> = [settings.address.as_deref(), settings.phone.as_deref(), settings.email.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !footer.is_empty() {
            doc.push(elements::Break::new(2));
            doc.push(elements::Paragraph::new(footer.join(" | ")).styled(style::Style::new().italic().with_font_size(8)));
        }

        // 3. Renderiza em memória
        let mut bytes = Vec::new();
        doc.render(&mut bytes).map_err(pdf_error)?;

        tracing::debug!(payment_id = %payment.id, size = bytes.len(), "Recibo gerado");
        Ok(Receipt { file_name: format!("recibo-{number}.pdf"), bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use crate::models::finance::PaymentGateway;

    #[test]
    fn formats_brazilian_currency() {
        assert_eq!(format_brl(Decimal::new(123456, 2)), "R$ 1.234,56");
        assert_eq!(format_brl(Decimal::new(14990, 2)), "R$ 149,90");
        assert_eq!(format_brl(Decimal::new(100000000, 2)), "R$ 1.000.000,00");
        assert_eq!(format_brl(Decimal::new(5, 0)), "R$ 5,00");
        assert_eq!(format_brl(Decimal::new(-2550, 2)), "-R$ 25,50");
    }

    #[test]
    fn receipt_number_is_short_and_stable() {
        let payment = Payment {
            id: Uuid::parse_str("0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9").unwrap(),
            client_id: Uuid::new_v4(),
            subscription_id: None,
            amount: Decimal::new(14990, 2),
            due_date: NaiveDate::from_ymd_opt(2025, 2, 10).unwrap(),
            paid_at: Some(Utc::now()),
            status: PaymentStatus::Confirmado,
            method: Some(PaymentMethod::Pix),
            gateway: PaymentGateway::Manual,
            external_id: None,
            description: "Mensalidade 02/2025".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(receipt_number(&payment), "0A1B2C3D");
    }
}
