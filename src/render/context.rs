/// Template context construction and placeholder substitution
///
/// The context is the merged, read-only view of business profile +
/// client + defaults fed to `{{dotted.path}}` substitution and to the
/// layout engine. Missing profile fields degrade to fixed fallback
/// literals; building a context never fails.
use crate::db::models::BusinessProfile;
use chrono::Utc;

const FALLBACK_COMPANY_NAME: &str = "La Mia Azienda";
const FALLBACK_COMPANY_ADDRESS: &str = "Via Esempio 123, Città";
const FALLBACK_TAX_ID: &str = "IT00000000000";
const FALLBACK_REGIME: &str = "forfettario";
const FALLBACK_CLIENT_NAME: &str = "Cliente";
const FALLBACK_VAT_RATE: f64 = 22.0;
const FALLBACK_CURRENCY: &str = "EUR";

/// Seller identity for the FORNITORE block
#[derive(Debug, Clone)]
pub struct CompanyInfo {
    pub name: String,
    pub address: String,
    pub tax_id: String,
    pub regime: String,
}

/// Buyer identity for the CLIENTE block
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub name: String,
    pub address: String,
}

/// Per-document defaults sourced from the business profile
#[derive(Debug, Clone)]
pub struct DocumentDefaults {
    pub vat_rate: f64,
    pub currency: String,
    pub footer_note: String,
}

/// Merged substitution context
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub company: CompanyInfo,
    pub client: ClientInfo,
    pub defaults: DocumentDefaults,
    pub today: String,
}

/// Merge profile and client into a substitution context
pub fn build_context(
    profile: Option<&BusinessProfile>,
    client: Option<ClientInfo>,
) -> TemplateContext {
    let field = |value: Option<&String>, fallback: &str| -> String {
        value
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    };

    let company = CompanyInfo {
        name: field(profile.and_then(|p| p.legal_name.as_ref()), FALLBACK_COMPANY_NAME),
        address: field(profile.and_then(|p| p.address.as_ref()), FALLBACK_COMPANY_ADDRESS),
        tax_id: field(profile.and_then(|p| p.vat_number.as_ref()), FALLBACK_TAX_ID),
        regime: field(profile.and_then(|p| p.tax_regime.as_ref()), FALLBACK_REGIME),
    };

    let client = client.unwrap_or_else(|| ClientInfo {
        name: FALLBACK_CLIENT_NAME.to_string(),
        address: String::new(),
    });

    let defaults = DocumentDefaults {
        vat_rate: profile
            .and_then(|p| p.default_vat_rate)
            .unwrap_or(FALLBACK_VAT_RATE),
        currency: field(
            profile.and_then(|p| p.default_currency.as_ref()),
            FALLBACK_CURRENCY,
        ),
        footer_note: field(profile.and_then(|p| p.default_footer_note.as_ref()), ""),
    };

    TemplateContext {
        company,
        client,
        defaults,
        today: Utc::now().format("%Y-%m-%d").to_string(),
    }
}

/// Replace every `{{dotted.path}}` token with the stringified context
/// value. Unresolved paths become the empty string and are logged;
/// substitution never fails. This is deliberately not a template
/// language: no conditionals, loops or escaping.
pub fn apply_template(text: &str, ctx: &TemplateContext) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                match resolve_path(ctx, path) {
                    Some(value) => out.push_str(&value),
                    None => {
                        tracing::debug!("unresolved template path: {}", path);
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated token: keep the remainder verbatim
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Walk a dotted path through the known context sections
fn resolve_path(ctx: &TemplateContext, path: &str) -> Option<String> {
    let mut segments = path.split('.');
    let head = segments.next()?;
    let tail = segments.next();
    if segments.next().is_some() {
        return None;
    }

    match (head, tail) {
        ("company", Some("name")) => Some(ctx.company.name.clone()),
        ("company", Some("address")) => Some(ctx.company.address.clone()),
        ("company", Some("taxId")) => Some(ctx.company.tax_id.clone()),
        ("company", Some("regime")) => Some(ctx.company.regime.clone()),
        ("client", Some("name")) => Some(ctx.client.name.clone()),
        ("client", Some("address")) => Some(ctx.client.address.clone()),
        ("defaults", Some("vatRate")) => Some(fmt_number(ctx.defaults.vat_rate)),
        ("defaults", Some("currency")) => Some(ctx.defaults.currency.clone()),
        ("defaults", Some("footerNote")) => Some(ctx.defaults.footer_note.clone()),
        ("today", None) => Some(ctx.today.clone()),
        _ => None,
    }
}

/// Integer-valued floats print without a trailing `.0`
pub(crate) fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_context() -> TemplateContext {
        let profile = BusinessProfile {
            user_id: 1,
            legal_name: Some("Rossi Consulting Srl".into()),
            address: Some("Via Roma 1, Milano".into()),
            vat_number: Some("IT12345678901".into()),
            fiscal_code: None,
            tax_regime: Some("ordinario".into()),
            default_vat_rate: Some(22.0),
            default_currency: Some("EUR".into()),
            default_footer_note: Some("Pagamento a 30 giorni".into()),
            updated_at: Utc::now(),
        };
        build_context(
            Some(&profile),
            Some(ClientInfo {
                name: "Mario".into(),
                address: "Via Verdi 2".into(),
            }),
        )
    }

    #[test]
    fn substitutes_known_paths() {
        let ctx = sample_context();
        assert_eq!(
            apply_template("Ciao {{client.name}}, IVA {{defaults.vatRate}}%", &ctx),
            "Ciao Mario, IVA 22%"
        );
        assert_eq!(
            apply_template("{{company.name}} ({{company.taxId}})", &ctx),
            "Rossi Consulting Srl (IT12345678901)"
        );
    }

    #[test]
    fn unresolved_paths_become_empty_never_error() {
        let ctx = sample_context();
        assert_eq!(apply_template("x{{nope.nope}}y", &ctx), "xy");
        assert_eq!(apply_template("{{company.unknown}}", &ctx), "");
        assert_eq!(apply_template("{{a.b.c}}", &ctx), "");
    }

    #[test]
    fn unterminated_tokens_stay_verbatim() {
        let ctx = sample_context();
        assert_eq!(apply_template("ciao {{client.name", &ctx), "ciao {{client.name");
    }

    #[test]
    fn whitespace_inside_tokens_is_tolerated() {
        let ctx = sample_context();
        assert_eq!(apply_template("{{ client.name }}", &ctx), "Mario");
    }

    #[test]
    fn today_resolves_as_iso_date() {
        let ctx = sample_context();
        let out = apply_template("{{today}}", &ctx);
        assert_eq!(out.len(), 10);
        assert_eq!(&out[4..5], "-");
    }

    #[test]
    fn missing_profile_degrades_to_fallbacks() {
        let ctx = build_context(None, None);
        assert_eq!(ctx.company.name, "La Mia Azienda");
        assert_eq!(ctx.company.tax_id, "IT00000000000");
        assert_eq!(ctx.client.name, "Cliente");
        assert!((ctx.defaults.vat_rate - 22.0).abs() < f64::EPSILON);
        assert_eq!(ctx.defaults.currency, "EUR");
    }

    #[test]
    fn blank_profile_fields_also_fall_back() {
        let profile = BusinessProfile {
            user_id: 1,
            legal_name: Some("   ".into()),
            address: None,
            vat_number: None,
            fiscal_code: None,
            tax_regime: None,
            default_vat_rate: None,
            default_currency: None,
            default_footer_note: None,
            updated_at: Utc::now(),
        };
        let ctx = build_context(Some(&profile), None);
        assert_eq!(ctx.company.name, "La Mia Azienda");
    }

    #[test]
    fn fractional_rates_keep_their_decimals() {
        assert_eq!(fmt_number(22.0), "22");
        assert_eq!(fmt_number(4.5), "4.5");
    }
}
