//! Positional message formatting
//!
//! Placeholders are `{n}`, `{n,number}` and `{n,date}` where `n` indexes the
//! argument list. Numbers follow the grouping and decimal conventions of the
//! target language; dates use its medium date pattern. Anything that is not
//! a well-formed placeholder is copied through unchanged.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use super::locale::base_language;

const MAX_FRACTION_DIGITS: usize = 3;

/// Substitutes `args` into `template`. With no arguments the template is
/// returned untouched, literal placeholders included.
pub fn format_message(template: &str, args: &[Value], locale: &str) -> String {
    if args.is_empty() {
        return template.to_string();
    }

    let conventions = Conventions::for_locale(locale);
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let body = &after[..close];
        match Placeholder::parse(body) {
            Some(placeholder) => {
                match args.get(placeholder.index) {
                    Some(arg) => out.push_str(&render(arg, placeholder.style, &conventions)),
                    None => out.push_str(&rest[open..open + close + 2]),
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Plain,
    Number,
    Date,
}

#[derive(Debug, Clone, Copy)]
struct Placeholder {
    index: usize,
    style: Style,
}

impl Placeholder {
    fn parse(body: &str) -> Option<Self> {
        let (index, style) = match body.split_once(',') {
            Some((index, style)) => {
                let style = match style.trim() {
                    "number" => Style::Number,
                    "date" => Style::Date,
                    _ => return None,
                };
                (index, style)
            }
            None => (body, Style::Plain),
        };

        let index = index.trim();
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            index: index.parse().ok()?,
            style,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatePattern {
    /// Jan 5, 2024
    MonthDayYear,
    /// 05.01.2024
    DayMonthYearDots,
    /// 05/01/2024
    DayMonthYearSlashes,
    /// 05-01-2024
    DayMonthYearDashes,
    /// 2024/01/05
    YearMonthDaySlashes,
    /// 2024-01-05
    Iso,
}

impl DatePattern {
    fn chrono_format(self) -> &'static str {
        match self {
            DatePattern::MonthDayYear => "%b %-d, %Y",
            DatePattern::DayMonthYearDots => "%d.%m.%Y",
            DatePattern::DayMonthYearSlashes => "%d/%m/%Y",
            DatePattern::DayMonthYearDashes => "%d-%m-%Y",
            DatePattern::YearMonthDaySlashes => "%Y/%m/%d",
            DatePattern::Iso => "%Y-%m-%d",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Conventions {
    group: char,
    decimal: char,
    date: DatePattern,
}

impl Conventions {
    fn for_locale(locale: &str) -> Self {
        let language = base_language(locale).to_ascii_lowercase();

        let (group, decimal) = match language.as_str() {
            "de" | "es" | "it" | "nl" | "pt" | "id" | "tr" | "da" | "el" => ('.', ','),
            "fr" | "ru" | "pl" | "cs" | "sk" | "sv" | "nb" | "no" | "fi" | "uk" | "hu" => {
                ('\u{00A0}', ',')
            }
            _ => (',', '.'),
        };

        let date = match language.as_str() {
            "en" => DatePattern::MonthDayYear,
            "de" | "ru" | "pl" | "cs" | "fi" | "nb" | "no" | "tr" | "uk" => {
                DatePattern::DayMonthYearDots
            }
            "fr" | "es" | "it" | "pt" | "el" => DatePattern::DayMonthYearSlashes,
            "nl" | "da" => DatePattern::DayMonthYearDashes,
            "ja" | "zh" => DatePattern::YearMonthDaySlashes,
            _ => DatePattern::Iso,
        };

        Self {
            group,
            decimal,
            date,
        }
    }
}

fn render(arg: &Value, style: Style, conventions: &Conventions) -> String {
    match style {
        Style::Plain => render_plain(arg, conventions),
        Style::Number => match arg {
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(n) => format_float(n, conventions),
                Err(_) => s.clone(),
            },
            other => render_plain(other, conventions),
        },
        Style::Date => {
            format_date(arg, conventions).unwrap_or_else(|| render_plain(arg, conventions))
        }
    }
}

fn render_plain(arg: &Value, conventions: &Conventions) -> String {
    match arg {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(n, conventions),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        // Arrays and objects as compact JSON
        other => other.to_string(),
    }
}

fn format_number(n: &serde_json::Number, conventions: &Conventions) -> String {
    if let Some(i) = n.as_i64() {
        let digits = i.unsigned_abs().to_string();
        let grouped = group_digits(&digits, conventions.group);
        return if i < 0 { format!("-{}", grouped) } else { grouped };
    }
    if let Some(u) = n.as_u64() {
        return group_digits(&u.to_string(), conventions.group);
    }
    format_float(n.as_f64().unwrap_or_default(), conventions)
}

fn format_float(value: f64, conventions: &Conventions) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        let symbol = if value < 0.0 { "-∞" } else { "∞" };
        return symbol.to_string();
    }

    let rendered = format!("{:.*}", MAX_FRACTION_DIGITS, value.abs());
    let (integer, fraction) = rendered
        .split_once('.')
        .unwrap_or((rendered.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut out = String::with_capacity(rendered.len() + 4);
    // -0.0001 rounds to 0 and loses its sign
    if value < 0.0 && (integer != "0" || !fraction.is_empty()) {
        out.push('-');
    }
    out.push_str(&group_digits(integer, conventions.group));
    if !fraction.is_empty() {
        out.push(conventions.decimal);
        out.push_str(fraction);
    }
    out
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * 2);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

fn format_date(arg: &Value, conventions: &Conventions) -> Option<String> {
    let date = match arg {
        Value::String(s) => parse_date(s.trim())?,
        // Epoch milliseconds
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?)?.date_naive(),
        _ => return None,
    };
    Some(date.format(conventions.date.chrono_format()).to_string())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(values: Value) -> Vec<Value> {
        match values {
            Value::Array(items) => items,
            other => vec![other],
        }
    }

    #[test]
    fn test_no_args_is_identity() {
        assert_eq!(format_message("Hello {0}", &[], "en"), "Hello {0}");
        assert_eq!(format_message("", &[], "en"), "");
    }

    #[test]
    fn test_positional_substitution() {
        let result = format_message(
            "Hello {0}, you have {1} items",
            &args(json!(["Ann", "3"])),
            "en",
        );
        assert_eq!(result, "Hello Ann, you have 3 items");
    }

    #[test]
    fn test_repeated_and_reordered_placeholders() {
        let result = format_message("{1} {0} {1}", &args(json!(["a", "b"])), "en");
        assert_eq!(result, "b a b");
    }

    #[test]
    fn test_unresolved_placeholder_kept() {
        let result = format_message("{0} and {2,number}", &args(json!(["x"])), "en");
        assert_eq!(result, "x and {2,number}");
    }

    #[test]
    fn test_malformed_placeholders_pass_through() {
        let a = args(json!(["x"]));
        assert_eq!(format_message("{name} {0}", &a, "en"), "{name} x");
        assert_eq!(format_message("{0,choice} {0}", &a, "en"), "{0,choice} x");
        assert_eq!(format_message("{} {0}", &a, "en"), "{} x");
        assert_eq!(format_message("tail {0", &a, "en"), "tail {0");
        assert_eq!(format_message("{{0}}", &a, "en"), "{x}");
    }

    #[test]
    fn test_strings_inserted_verbatim() {
        let result = format_message("{0}", &args(json!(["1234.5"])), "de");
        assert_eq!(result, "1234.5");
    }

    #[test]
    fn test_number_grouping_per_language() {
        let a = args(json!([1234.5]));
        assert_eq!(format_message("{0}", &a, "en-US"), "1,234.5");
        assert_eq!(format_message("{0}", &a, "de"), "1.234,5");
        assert_eq!(format_message("{0}", &a, "fr"), "1\u{00A0}234,5");
    }

    #[test]
    fn test_integer_formatting() {
        let a = args(json!([1234567, -9876, 12]));
        assert_eq!(
            format_message("{0} {1} {2}", &a, "en"),
            "1,234,567 -9,876 12"
        );
        assert_eq!(format_message("{0}", &a, "de_DE"), "1.234.567");
    }

    #[test]
    fn test_fraction_digits_capped() {
        assert_eq!(format_message("{0}", &args(json!([1.23456])), "en"), "1.235");
        assert_eq!(format_message("{0}", &args(json!([0.5])), "en"), "0.5");
        assert_eq!(format_message("{0}", &args(json!([-0.0001])), "en"), "0");
        assert_eq!(format_message("{0}", &args(json!([-2.5])), "de"), "-2,5");
    }

    #[test]
    fn test_number_style_parses_strings() {
        let a = args(json!(["9999.25", "n/a"]));
        assert_eq!(
            format_message("{0,number} {1,number}", &a, "en"),
            "9,999.25 n/a"
        );
    }

    #[test]
    fn test_date_style_per_language() {
        let a = args(json!(["2024-01-05T10:30:00Z"]));
        assert_eq!(format_message("{0,date}", &a, "en"), "Jan 5, 2024");
        assert_eq!(format_message("{0,date}", &a, "de"), "05.01.2024");
        assert_eq!(format_message("{0,date}", &a, "fr-FR"), "05/01/2024");
        assert_eq!(format_message("{0,date}", &a, "ja"), "2024/01/05");
        assert_eq!(format_message("{0,date}", &a, "zh_CN"), "2024/01/05");
    }

    #[test]
    fn test_date_style_accepts_plain_dates_and_epoch_millis() {
        assert_eq!(
            format_message("{0, date}", &args(json!(["2023-12-31"])), "en"),
            "Dec 31, 2023"
        );
        assert_eq!(
            format_message("{0,date}", &args(json!([0])), "de"),
            "01.01.1970"
        );
    }

    #[test]
    fn test_unparseable_date_rendered_plain() {
        let result = format_message("{0,date}", &args(json!(["tomorrow"])), "en");
        assert_eq!(result, "tomorrow");
    }

    #[test]
    fn test_other_json_types() {
        let a = args(json!([true, null, [1, 2], {"k": "v"}]));
        assert_eq!(
            format_message("{0} {1} {2} {3}", &a, "en"),
            r#"true null [1,2] {"k":"v"}"#
        );
    }

    #[test]
    fn test_non_ascii_text_around_placeholders() {
        let result = format_message("Grüße, {0}! 你好", &args(json!(["Zoë"])), "de");
        assert_eq!(result, "Grüße, Zoë! 你好");
    }
}
