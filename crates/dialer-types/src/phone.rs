//! Phone number helpers.
//!
//! This is deliberately not an E.164 implementation. The dialer needs three
//! things: to turn what a seller typed into a `+<digits>` destination, to
//! split a pasted international number back into country code and national
//! part for display, and to tell a public-network number apart from an
//! internal client identity when the provider asks for call instructions.

use thiserror::Error;

/// Why a dial destination could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DestinationError {
    #[error("no digits to dial")]
    EmptyNumber,
    #[error("a national number needs a country code")]
    MissingCountryCode,
}

/// One entry of the fixed calling-code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryPrefix {
    /// Calling code digits, without the leading `+`.
    pub code: &'static str,
    /// ISO 3166-1 alpha-2 region.
    pub region: &'static str,
}

const fn prefix(code: &'static str, region: &'static str) -> CountryPrefix {
    CountryPrefix { code, region }
}

/// Calling codes the sales floor dials. Overlapping codes (the NANP `1`
/// shared by US and CA, `7` shared by RU and KZ) resolve to the first entry.
pub const COUNTRY_PREFIXES: &[CountryPrefix] = &[
    prefix("1", "US"),
    prefix("1", "CA"),
    prefix("7", "RU"),
    prefix("7", "KZ"),
    prefix("30", "GR"),
    prefix("31", "NL"),
    prefix("32", "BE"),
    prefix("33", "FR"),
    prefix("34", "ES"),
    prefix("36", "HU"),
    prefix("39", "IT"),
    prefix("40", "RO"),
    prefix("41", "CH"),
    prefix("43", "AT"),
    prefix("44", "GB"),
    prefix("45", "DK"),
    prefix("46", "SE"),
    prefix("47", "NO"),
    prefix("48", "PL"),
    prefix("49", "DE"),
    prefix("61", "AU"),
    prefix("64", "NZ"),
    prefix("90", "TR"),
    prefix("91", "IN"),
    prefix("298", "FO"),
    prefix("299", "GL"),
    prefix("351", "PT"),
    prefix("352", "LU"),
    prefix("353", "IE"),
    prefix("354", "IS"),
    prefix("358", "FI"),
    prefix("370", "LT"),
    prefix("371", "LV"),
    prefix("372", "EE"),
    prefix("420", "CZ"),
    prefix("421", "SK"),
    prefix("971", "AE"),
];

/// Minimum number of digits after `+` for a number to be dial-able.
const MIN_DIALABLE_DIGITS: usize = 7;
/// Maximum number of digits after `+` (E.164 upper bound).
const MAX_DIALABLE_DIGITS: usize = 15;

/// Strips formatting characters, keeping digits and a leading `+`.
///
/// A leading international `00` is rewritten to `+`.
pub fn normalize_digits(input: &str) -> String {
    let trimmed = input.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if has_plus {
        format!("+{digits}")
    } else if let Some(rest) = digits.strip_prefix("00") {
        format!("+{rest}")
    } else {
        digits
    }
}

/// Longest-prefix match of an international number against [`COUNTRY_PREFIXES`].
///
/// Accepts `+4512345678`, `004512345678` or formatted variants. Returns the
/// matched prefix and the remaining national digits, or `None` if the input
/// is not in international form or no prefix matches.
pub fn split_country_code(input: &str) -> Option<(CountryPrefix, String)> {
    let normalized = normalize_digits(input);
    let digits = normalized.strip_prefix('+')?;

    let best = COUNTRY_PREFIXES
        .iter()
        .filter(|p| digits.starts_with(p.code))
        .fold(None::<&CountryPrefix>, |best, candidate| match best {
            Some(b) if b.code.len() >= candidate.code.len() => Some(b),
            _ => Some(candidate),
        })?;

    let national = digits[best.code.len()..].to_string();
    if national.is_empty() {
        return None;
    }
    Some((*best, national))
}

/// Builds the `+<country code><national number>` destination for a dial.
///
/// If `number` is already international (`+…` or `00…`) the country code
/// argument is ignored. A single national trunk `0` is dropped, except for
/// Italy where it is part of the subscriber number.
///
/// # Errors
///
/// [`DestinationError::EmptyNumber`] when no digits remain and
/// [`DestinationError::MissingCountryCode`] for a national number without a
/// country code.
pub fn compose_destination(country_code: &str, number: &str) -> Result<String, DestinationError> {
    let normalized = normalize_digits(number);
    if let Some(international) = normalized.strip_prefix('+') {
        if international.is_empty() {
            return Err(DestinationError::EmptyNumber);
        }
        return Ok(normalized);
    }

    let code: String = country_code.chars().filter(|c| c.is_ascii_digit()).collect();
    let national = match normalized.strip_prefix('0') {
        Some(rest) if code != "39" => rest.to_string(),
        _ => normalized,
    };

    if national.is_empty() {
        return Err(DestinationError::EmptyNumber);
    }
    if code.is_empty() {
        return Err(DestinationError::MissingCountryCode);
    }
    Ok(format!("+{code}{national}"))
}

/// Whether `to` is a public-network number the provider can bridge to.
///
/// Internal client identities (`client:seller_42`, bare identities) and
/// anything without a leading `+` are not dial-able.
pub fn is_dialable(to: &str) -> bool {
    let Some(digits) = to.trim().strip_prefix('+') else {
        return false;
    };
    (MIN_DIALABLE_DIGITS..=MAX_DIALABLE_DIGITS).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let (prefix, national) = split_country_code("+298123456").unwrap();
        assert_eq!(prefix.code, "298");
        assert_eq!(prefix.region, "FO");
        assert_eq!(national, "123456");

        let (prefix, national) = split_country_code("+4512345678").unwrap();
        assert_eq!(prefix.code, "45");
        assert_eq!(national, "12345678");
    }

    #[test]
    fn overlapping_prefix_resolves_to_first_entry() {
        let (prefix, _) = split_country_code("+1 415 555 0100").unwrap();
        assert_eq!(prefix.region, "US");
    }

    #[test]
    fn split_requires_international_form() {
        assert!(split_country_code("12345678").is_none());
        assert!(split_country_code("+45").is_none());
        assert!(split_country_code("+8881234").is_none());
    }

    #[test]
    fn double_zero_is_international() {
        assert_eq!(normalize_digits("0045 12 34 56 78"), "+4512345678");
        let (prefix, _) = split_country_code("0046701234567").unwrap();
        assert_eq!(prefix.region, "SE");
    }

    #[test]
    fn compose_from_national_number() {
        assert_eq!(
            compose_destination("45", "12 34 56 78").as_deref(),
            Ok("+4512345678")
        );
        assert_eq!(
            compose_destination("+49", "030 1234567").as_deref(),
            Ok("+49301234567")
        );
        assert_eq!(
            compose_destination("39", "06 1234567").as_deref(),
            Ok("+39061234567")
        );
    }

    #[test]
    fn compose_keeps_international_input() {
        assert_eq!(
            compose_destination("45", "+46 70 123 45 67").as_deref(),
            Ok("+46701234567")
        );
    }

    #[test]
    fn compose_rejects_empty() {
        assert_eq!(compose_destination("45", ""), Err(DestinationError::EmptyNumber));
        assert_eq!(compose_destination("45", " - "), Err(DestinationError::EmptyNumber));
        assert_eq!(compose_destination("45", "+"), Err(DestinationError::EmptyNumber));
        assert_eq!(compose_destination("", ""), Err(DestinationError::EmptyNumber));
    }

    #[test]
    fn national_number_needs_country_code() {
        assert_eq!(
            compose_destination("", "12345678"),
            Err(DestinationError::MissingCountryCode)
        );
        assert_eq!(
            compose_destination("  ", "0612345678"),
            Err(DestinationError::MissingCountryCode)
        );
        assert_eq!(
            compose_destination("", "+45 12 34 56 78").as_deref(),
            Ok("+4512345678")
        );
    }

    #[test]
    fn dialable_numbers() {
        assert!(is_dialable("+4512345678"));
        assert!(!is_dialable("4512345678"));
        assert!(!is_dialable("client:seller_42"));
        assert!(!is_dialable("+45"));
        assert!(!is_dialable("+45 1234 5678"));
    }
}
