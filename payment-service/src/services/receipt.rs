//! PDF receipt rendering for successful transactions.

use anyhow::{Result, bail};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use rust_decimal::Decimal;

use crate::models::{Transaction, TransactionStatus};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;

fn amount_line(label: &str, amount: Decimal, currency: &str) -> String {
    format!("{label}: {amount:.2} {currency}")
}

/// Render a receipt for a successful transaction as PDF bytes.
pub fn render_receipt(transaction: &Transaction) -> Result<Vec<u8>> {
    if transaction.status != TransactionStatus::Success {
        bail!("Receipt is only available for successful transactions");
    }

    let (doc, page, layer) = PdfDocument::new(
        "Payment Receipt",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "receipt",
    );
    let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
    let current = doc.get_page(page).get_layer(layer);

    let mut y = PAGE_HEIGHT_MM - 30.0;
    current.use_text("Payment Receipt", 20.0, Mm(MARGIN_MM), Mm(y), &bold);
    y -= 14.0;

    let completed = transaction
        .completed_at
        .and_then(|d| d.try_to_rfc3339_string().ok())
        .unwrap_or_default();

    let currency = transaction.currency.as_str();
    let subtotal = transaction.original_amount - transaction.discount_amount;

    let mut lines = vec![
        format!("Transaction: {}", transaction.id),
        format!("Date: {completed}"),
        format!("Course: {}", transaction.course_title),
        String::new(),
        amount_line("Original amount", transaction.original_amount, currency),
    ];

    if let Some(code) = &transaction.discount_code {
        lines.push(format!(
            "Discount ({code}): -{:.2} {currency}",
            transaction.discount_amount
        ));
    }

    lines.push(amount_line("Subtotal", subtotal, currency));
    lines.push(amount_line("GST (18%)", transaction.gst_amount, currency));
    lines.push(amount_line("Total paid", transaction.final_amount, currency));
    lines.push(String::new());

    if let Some(gateway_id) = &transaction.gateway_transaction_id {
        lines.push(format!("Gateway reference: {gateway_id}"));
    }

    for line in lines {
        if !line.is_empty() {
            current.use_text(line, 11.0, Mm(MARGIN_MM), Mm(y), &font);
        }
        y -= 8.0;
    }

    let bytes = doc.save_to_bytes()?;
    Ok(bytes)
}
