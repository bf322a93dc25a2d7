//! Fixed-width receipt text for the print view.

use rust_decimal::Decimal;

use crate::models::{EyeRefraction, Invoice};

/// Narrowest receipt the layout supports.
pub const MIN_RECEIPT_WIDTH: usize = 24;

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// `left` and `right` on one line, `right` flush to the edge.
fn spread(left: &str, right: &str, width: usize) -> String {
    let right_len = right.chars().count();
    let room = width.saturating_sub(right_len + 1);
    let left = truncate(left, room);
    let gap = width.saturating_sub(left.chars().count() + right_len);
    format!("{}{}{}", left, " ".repeat(gap.max(1)), right)
}

fn center(text: &str, width: usize) -> String {
    let text = truncate(text, width);
    let pad = (width - text.chars().count()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

fn refraction_line(label: &str, eye: &EyeRefraction) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(sphere) = eye.sphere {
        parts.push(format!("SPH {:+.2}", sphere));
    }
    if let Some(cylinder) = eye.cylinder {
        parts.push(format!("CYL {:+.2}", cylinder));
    }
    if let Some(axis) = eye.axis {
        parts.push(format!("AX {}", axis));
    }
    if let Some(addition) = eye.addition {
        parts.push(format!("ADD {:+.2}", addition));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("{} {}", label, parts.join(" ")))
    }
}

/// Render `invoice` as plain text lines no wider than `width` characters
/// (at least [`MIN_RECEIPT_WIDTH`]).
pub fn render_receipt(invoice: &Invoice, width: usize) -> String {
    let width = width.max(MIN_RECEIPT_WIDTH);
    let rule = "-".repeat(width);
    let mut lines = Vec::new();

    lines.push(center("SALES RECEIPT", width));
    if invoice.voided {
        lines.push(center("*** VOID ***", width));
    }
    let short_id: String = invoice.id.chars().take(8).collect();
    lines.push(spread("No.", &short_id, width));
    lines.push(spread(
        "Date",
        &invoice.created_at.format("%Y-%m-%d %H:%M").to_string(),
        width,
    ));
    lines.push(truncate(&format!("Client: {}", invoice.client.full_name), width));
    lines.push(truncate(&format!("ID: {}", invoice.client.national_id), width));
    lines.push(rule.clone());

    for item in &invoice.items {
        let description = format!("{} x {}", item.quantity, item.description);
        lines.push(spread(&description, &money(item.total), width));
        if item.quantity > 1 {
            lines.push(truncate(&format!("    @ {}", money(item.unit_price)), width));
        }
    }
    lines.push(rule.clone());

    let tax_label = format!(
        "Tax ({}%)",
        (invoice.tax_rate * Decimal::ONE_HUNDRED).normalize()
    );
    lines.push(spread("Subtotal", &money(invoice.subtotal), width));
    lines.push(spread(&tax_label, &money(invoice.tax), width));
    lines.push(spread("TOTAL", &money(invoice.total), width));
    lines.push(spread(
        &format!("Paid ({})", invoice.payment_method.as_str()),
        &money(invoice.amount_paid),
        width,
    ));
    if invoice.balance() > Decimal::ZERO {
        lines.push(spread("Balance due", &money(invoice.balance()), width));
    }

    if let Some(history) = &invoice.clinical_snapshot {
        let fields = &history.fields;
        let eyes: Vec<String> = [("OD", &fields.right_eye), ("OS", &fields.left_eye)]
            .into_iter()
            .filter_map(|(label, eye)| eye.as_ref().and_then(|e| refraction_line(label, e)))
            .map(|line| truncate(&line, width))
            .collect();
        if !eyes.is_empty() || fields.pupillary_distance.is_some() {
            lines.push(rule.clone());
            lines.extend(eyes);
            if let Some(pd) = fields.pupillary_distance {
                lines.push(truncate(&format!("PD {} mm", pd), width));
            }
        }
    }

    lines.push(rule);
    lines.push(center(&format!("Served by {}", invoice.operator), width));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
