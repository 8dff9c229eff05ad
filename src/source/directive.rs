//! Structured-text line grammar
//!
//! A line is zero or more bracketed modifiers followed by a path, or by the
//! sentinel `*` which targets the tree's globals. Three whole-line forms carry
//! no path: `[r]`, `[+]keyword` and `[-]keyword-or-path`.

use crate::error::DirectiveError;
use crate::mode::ModeTable;
use crate::types::Level;

/// One bracket modifier
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// `[%NN]` / `[%NN%]`: fixed percentage of the parent's pool
    Reservation(f64),
    /// `[NN%]`: scale the default share by NN/100
    Multiplier(f64),
    /// `[N]`: absolute repeat count on leaves, plain multiplier on branches
    Repeat(u32),
    /// `[b1w3,-20]`
    Mode(ModeTable),
    /// `[gN]`
    Graft(Level),
    /// `[>name]`
    Group(String),
    /// `[f]`
    Flatten,
    /// `[/]`
    NoRecurse,
    /// `[v]` / `[nv]`
    Video(bool),
    /// `[m]` / `[nm]`
    Mute(bool),
}

impl Modifier {
    /// Application rank; lower ranks apply first
    pub fn precedence(&self) -> u8 {
        match self {
            Modifier::Reservation(_) => 0,
            Modifier::Multiplier(_) | Modifier::Repeat(_) => 1,
            Modifier::Mode(_) => 2,
            Modifier::Graft(_) => 3,
            Modifier::Group(_) => 4,
            Modifier::Video(_) | Modifier::Mute(_) => 5,
            Modifier::Flatten | Modifier::NoRecurse => 6,
        }
    }

    /// Parse the text between one pair of brackets
    pub fn parse(token: &str) -> Option<Modifier> {
        let token = token.trim();
        let lower = token.to_ascii_lowercase();
        match lower.as_str() {
            "f" => return Some(Modifier::Flatten),
            "/" => return Some(Modifier::NoRecurse),
            "v" => return Some(Modifier::Video(true)),
            "nv" => return Some(Modifier::Video(false)),
            "m" => return Some(Modifier::Mute(true)),
            "nm" => return Some(Modifier::Mute(false)),
            _ => {}
        }

        if let Some(name) = token.strip_prefix('>') {
            let name = name.trim();
            return (!name.is_empty()).then(|| Modifier::Group(name.to_string()));
        }
        if let Some(rest) = lower.strip_prefix('%') {
            let digits = rest.strip_suffix('%').unwrap_or(rest);
            return all_digits(digits)
                .then(|| digits.parse::<f64>().ok())
                .flatten()
                .map(Modifier::Reservation);
        }
        if let Some(digits) = lower.strip_suffix('%') {
            return all_digits(digits)
                .then(|| digits.parse::<f64>().ok())
                .flatten()
                .map(|percent| Modifier::Multiplier(percent / 100.0));
        }
        if all_digits(&lower) {
            return lower.parse().ok().map(Modifier::Repeat);
        }
        if let Some(digits) = lower.strip_prefix('g') {
            if all_digits(digits) {
                return digits.parse().ok().filter(|l| *l > 0).map(Modifier::Graft);
            }
        }
        if lower.starts_with('b') || lower.starts_with('w') {
            return ModeTable::parse(&lower).ok().map(Modifier::Mode);
        }
        None
    }
}

fn all_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// What a line applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The `*` sentinel
    Global,
    Path(String),
}

/// One parsed structured-text line
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `[r]`: full random selection
    Random,
    /// `[+]keyword`: every included keyword must appear in a file path
    Include(String),
    /// `[-]keyword` or `[-]/absolute/path`
    Exclude(String),
    Entry {
        modifiers: Vec<Modifier>,
        target: Target,
    },
}

/// Parse one line. Comments and blank lines yield `None`.
pub fn parse_line(raw: &str, line: usize) -> Result<Option<Directive>, DirectiveError> {
    let text = raw.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let text = text.replace('"', "");
    let text = text.trim();

    let lower = text.to_ascii_lowercase();
    if lower.starts_with("[r]") {
        return Ok(Some(Directive::Random));
    }
    if let Some(keyword) = text.strip_prefix("[+]") {
        return Ok(Some(Directive::Include(keyword.trim().to_string())));
    }
    if let Some(keyword) = text.strip_prefix("[-]") {
        return Ok(Some(Directive::Exclude(keyword.trim().to_string())));
    }

    let mut modifiers = Vec::new();
    let mut rest = text;
    while let Some(after_open) = rest.strip_prefix('[') {
        let Some(close) = after_open.find(']') else {
            break;
        };
        let token = &after_open[..close];
        let modifier = Modifier::parse(token).ok_or_else(|| DirectiveError {
            line,
            modifier: token.to_string(),
            text: text.to_string(),
        })?;
        modifiers.push(modifier);
        rest = after_open[close + 1..].trim_start();
    }
    modifiers.sort_by_key(Modifier::precedence);

    let path = rest.trim();
    let target = if path == "*" {
        Target::Global
    } else if path.is_empty() {
        return Ok(None);
    } else {
        Target::Path(path.to_string())
    };
    Ok(Some(Directive::Entry { modifiers, target }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(line: &str) -> (Vec<Modifier>, Target) {
        match parse_line(line, 1).unwrap().unwrap() {
            Directive::Entry { modifiers, target } => (modifiers, target),
            other => panic!("unexpected directive {:?}", other),
        }
    }

    #[test]
    fn test_comment_and_blank_lines() {
        assert_eq!(parse_line("   ", 1).unwrap(), None);
        assert_eq!(parse_line("# note", 2).unwrap(), None);
    }

    #[test]
    fn test_whole_line_forms() {
        assert_eq!(parse_line("[R]", 1).unwrap(), Some(Directive::Random));
        assert_eq!(
            parse_line("[+] beach", 1).unwrap(),
            Some(Directive::Include("beach".to_string()))
        );
        assert_eq!(
            parse_line("[-]/pics/private", 1).unwrap(),
            Some(Directive::Exclude("/pics/private".to_string()))
        );
    }

    #[test]
    fn test_modifiers_are_ordered_by_precedence() {
        let (modifiers, target) = entry("[f][g3][>faves][%25][b1w3,-20] \"/pics/a\"");
        assert_eq!(target, Target::Path("/pics/a".to_string()));
        assert_eq!(modifiers[0], Modifier::Reservation(25.0));
        assert!(matches!(modifiers[1], Modifier::Mode(_)));
        assert_eq!(modifiers[2], Modifier::Graft(3));
        assert_eq!(modifiers[3], Modifier::Group("faves".to_string()));
        assert_eq!(modifiers[4], Modifier::Flatten);
    }

    #[test]
    fn test_numeric_tokens() {
        assert_eq!(Modifier::parse("150%"), Some(Modifier::Multiplier(1.5)));
        assert_eq!(Modifier::parse("3"), Some(Modifier::Repeat(3)));
        assert_eq!(Modifier::parse("%40%"), Some(Modifier::Reservation(40.0)));
        assert_eq!(Modifier::parse("G2"), Some(Modifier::Graft(2)));
        assert_eq!(Modifier::parse("g0"), None);
        assert_eq!(Modifier::parse("nv"), Some(Modifier::Video(false)));
        assert_eq!(Modifier::parse("/"), Some(Modifier::NoRecurse));
    }

    #[test]
    fn test_global_sentinel() {
        let (modifiers, target) = entry("[w2,10] *");
        assert_eq!(target, Target::Global);
        assert_eq!(modifiers.len(), 1);
    }

    #[test]
    fn test_unknown_token_is_fatal() {
        let err = parse_line("[zz] /pics/a", 7).unwrap_err();
        assert_eq!(err.line, 7);
        assert_eq!(err.modifier, "zz");
    }

    #[test]
    fn test_brackets_inside_path_are_kept() {
        let (modifiers, target) = entry("[2] /pics/[2020] trip");
        assert_eq!(modifiers, vec![Modifier::Repeat(2)]);
        assert_eq!(target, Target::Path("/pics/[2020] trip".to_string()));
    }
}
