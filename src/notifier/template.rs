//! Locale-specific email rendering.

use minijinja::{context, Environment};
use url::Url;

use super::error::NotifyError;
use crate::models::{Alert, ChangeKind, Locale};

const EN_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f4f4f5;font-family:Arial,Helvetica,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f4f4f5;padding:24px 0;">
<tr><td align="center">
<table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;">
  <tr><td style="background:#1a1a2e;padding:20px 24px;color:#ffffff;font-size:20px;font-weight:bold;">
    Norr&oslash;na Alert
  </td></tr>
  <tr><td style="padding:0;">
    <img src="{{ image_url }}" alt="{{ product_name }}" width="600" style="display:block;width:100%;height:auto;">
  </td></tr>
  <tr><td style="padding:24px;">
    <span style="display:inline-block;background:#e0f2fe;color:#0369a1;font-size:12px;font-weight:600;padding:4px 10px;border-radius:4px;margin-bottom:12px;">{{ change_label }}</span>
    <h1 style="margin:12px 0 8px;font-size:22px;color:#1a1a2e;">{{ product_name }}</h1>
    <p style="margin:0 0 16px;font-size:28px;font-weight:bold;color:#16a34a;">
      {{ price }} NOK
      <span style="font-size:16px;color:#9ca3af;text-decoration:line-through;margin-left:8px;">{{ original_price }} NOK</span>
      <span style="font-size:14px;color:#dc2626;margin-left:8px;">-{{ discount }}%</span>
    </p>
    <a href="{{ product_url }}" style="display:inline-block;background:#1a1a2e;color:#ffffff;text-decoration:none;padding:12px 32px;border-radius:6px;font-size:16px;font-weight:600;">View Product</a>
  </td></tr>
  <tr><td style="padding:16px 24px;background:#f9fafb;border-top:1px solid #e5e7eb;font-size:12px;color:#9ca3af;text-align:center;">
    You received this because you set up an alert on Norr&oslash;na Alert.<br>
    <a href="{{ unsubscribe_url }}" style="color:#6b7280;">Unsubscribe</a>
  </td></tr>
</table>
</td></tr>
</table>
</body>
</html>"##;

const NB_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="nb">
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f4f4f5;font-family:Arial,Helvetica,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f4f4f5;padding:24px 0;">
<tr><td align="center">
<table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;">
  <tr><td style="background:#1a1a2e;padding:20px 24px;color:#ffffff;font-size:20px;font-weight:bold;">
    Norr&oslash;na Alert
  </td></tr>
  <tr><td style="padding:0;">
    <img src="{{ image_url }}" alt="{{ product_name }}" width="600" style="display:block;width:100%;height:auto;">
  </td></tr>
  <tr><td style="padding:24px;">
    <span style="display:inline-block;background:#e0f2fe;color:#0369a1;font-size:12px;font-weight:600;padding:4px 10px;border-radius:4px;margin-bottom:12px;">{{ change_label }}</span>
    <h1 style="margin:12px 0 8px;font-size:22px;color:#1a1a2e;">{{ product_name }}</h1>
    <p style="margin:0 0 16px;font-size:28px;font-weight:bold;color:#16a34a;">
      {{ price }} NOK
      <span style="font-size:16px;color:#9ca3af;text-decoration:line-through;margin-left:8px;">{{ original_price }} NOK</span>
      <span style="font-size:14px;color:#dc2626;margin-left:8px;">-{{ discount }}%</span>
    </p>
    <a href="{{ product_url }}" style="display:inline-block;background:#1a1a2e;color:#ffffff;text-decoration:none;padding:12px 32px;border-radius:6px;font-size:16px;font-weight:600;">Se produkt</a>
  </td></tr>
  <tr><td style="padding:16px 24px;background:#f9fafb;border-top:1px solid #e5e7eb;font-size:12px;color:#9ca3af;text-align:center;">
    Du mottar denne e-posten fordi du har satt opp et varsel p&aring; Norr&oslash;na Alert.<br>
    <a href="{{ unsubscribe_url }}" style="color:#6b7280;">Avmeld</a>
  </td></tr>
</table>
</td></tr>
</table>
</body>
</html>"##;

/// Email subject line for the given product and locale.
pub fn subject(product_name: &str, locale: Locale) -> String {
    match locale {
        Locale::NbNo => format!("Prisvarsel: {product_name}"),
        Locale::EnGb => format!("Price Alert: {product_name}"),
    }
}

fn change_label(kind: ChangeKind, locale: Locale) -> &'static str {
    match (locale, kind) {
        (Locale::NbNo, ChangeKind::PriceDrop) => "Prisfall",
        (Locale::NbNo, ChangeKind::New) => "Nytt produkt",
        (Locale::NbNo, ChangeKind::Restock) => "Tilbake på lager",
        (Locale::EnGb, ChangeKind::PriceDrop) => "Price Drop",
        (Locale::EnGb, ChangeKind::New) => "New Product",
        (Locale::EnGb, ChangeKind::Restock) => "Back in Stock",
    }
}

/// Pre-compiled alert email templates, one per locale.
pub struct EmailTemplates {
    env: Environment<'static>,
}

impl EmailTemplates {
    /// Compiles the templates.
    pub fn new() -> Result<Self, NotifyError> {
        let mut env = Environment::new();
        env.add_template("alert_en", EN_TEMPLATE)?;
        env.add_template("alert_nb", NB_TEMPLATE)?;
        Ok(Self { env })
    }

    /// Renders the alert email body for one subscriber.
    pub fn render(
        &self,
        alert: &Alert,
        subscriber_email: &str,
        locale: Locale,
        frontend_url: &Url,
    ) -> Result<String, NotifyError> {
        let product = &alert.change.new_state;
        let template_name = match locale {
            Locale::NbNo => "alert_nb",
            Locale::EnGb => "alert_en",
        };
        let unsubscribe_url =
            frontend_url.join(&format!("unsubscribe?email={subscriber_email}"))?;

        let html = self.env.get_template(template_name)?.render(context! {
            product_name => &product.name,
            product_url => &product.url,
            image_url => &product.image_url,
            price => format!("{:.2}", product.price),
            original_price => format!("{:.2}", product.original_price),
            discount => format!("{:.0}", product.discount_pct),
            change_label => change_label(alert.change.kind, locale),
            unsubscribe_url => unsubscribe_url.to_string(),
        })?;
        Ok(html)
    }
}
