/// Archive-name pattern language: tokens expanded once, before any disk
/// operation, per §6 "Pattern language". Also implements the inverse
/// recovery used by the round-trip law in §8 ("Building an archive name
/// from a pattern and then applying the inverse regex recovers
/// `ComputerName`, `SystemType`, `TimeStamp` when those tokens were
/// present").
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SystemType {
    WorkStation,
    DomainController,
    Server,
}

impl SystemType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::WorkStation => "WorkStation",
            Self::DomainController => "DomainController",
            Self::Server => "Server",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "WorkStation" => Some(Self::WorkStation),
            "DomainController" => Some(Self::DomainController),
            "Server" => Some(Self::Server),
            _ => None,
        }
    }
}

/// Values substituted for each token; all fields optional since not every
/// pattern uses every token.
#[derive(Clone, Debug, Default)]
pub struct PatternContext {
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub directory_name: Option<String>,
    pub computer_name: Option<String>,
    pub full_computer_name: Option<String>,
    pub system_type: Option<SystemType>,
    pub timestamp: Option<DateTime<Utc>>,
    pub run_id: Option<Uuid>,
}

const TOKENS: &[&str] = &[
    "{Name}",
    "{FileName}",
    "{DirectoryName}",
    "{ComputerName}",
    "{FullComputerName}",
    "{SystemType}",
    "{TimeStamp}",
    "{RunId}",
];

/// Expand every recognized token in `pattern` against `ctx`. Unknown
/// tokens, or tokens whose context value is absent, are left verbatim so
/// the caller can detect them if needed.
pub fn expand(pattern: &str, ctx: &PatternContext) -> String {
    let mut out = pattern.to_string();
    if let Some(v) = &ctx.name {
        out = out.replace("{Name}", v);
    }
    if let Some(v) = &ctx.file_name {
        out = out.replace("{FileName}", v);
    }
    if let Some(v) = &ctx.directory_name {
        out = out.replace("{DirectoryName}", v);
    }
    if let Some(v) = &ctx.computer_name {
        out = out.replace("{ComputerName}", v);
    }
    if let Some(v) = &ctx.full_computer_name {
        out = out.replace("{FullComputerName}", v);
    }
    if let Some(v) = &ctx.system_type {
        out = out.replace("{SystemType}", v.as_str());
    }
    if let Some(v) = &ctx.timestamp {
        out = out.replace("{TimeStamp}", &v.format("%Y%m%d_%H%M%S").to_string());
    }
    if let Some(v) = &ctx.run_id {
        out = out.replace("{RunId}", &v.to_string());
    }
    out
}

/// Recovered token values extracted by matching an expanded name back
/// against its originating pattern.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecoveredTokens {
    pub values: HashMap<String, String>,
}

/// Build a regex-shaped matcher from `pattern` (literal segments escaped,
/// each known token becomes a capturing group), then apply it to
/// `expanded_name` to recover the substituted values.
///
/// This is the "inverse regex recovery" referenced in §8: rather than
/// depending on an external regex engine, the pattern is split on its
/// known token boundaries and matched segment-by-segment, which is
/// equivalent for patterns (the common case) that don't repeat a literal
/// substring adjacent to a token in an ambiguous way.
pub fn recover(pattern: &str, expanded_name: &str) -> Option<RecoveredTokens> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut rest = pattern;
    loop {
        match find_next_token(rest) {
            Some((pre, token, post)) => {
                if !pre.is_empty() {
                    segments.push(Segment::Literal(pre.to_string()));
                }
                segments.push(Segment::Token(token.to_string()));
                rest = post;
            }
            None => {
                if !rest.is_empty() {
                    segments.push(Segment::Literal(rest.to_string()));
                }
                break;
            }
        }
    }

    let mut cursor = expanded_name;
    let mut values = HashMap::new();

    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Literal(lit) => {
                if !cursor.starts_with(lit.as_str()) {
                    return None;
                }
                cursor = &cursor[lit.len()..];
            }
            Segment::Token(token) => {
                let next_literal = segments[i + 1..].iter().find_map(|s| match s {
                    Segment::Literal(l) => Some(l.as_str()),
                    Segment::Token(_) => None,
                });
                let value = match next_literal {
                    Some(lit) => {
                        let end = cursor.find(lit)?;
                        let v = &cursor[..end];
                        cursor = &cursor[end..];
                        v
                    }
                    None => {
                        let v = cursor;
                        cursor = "";
                        v
                    }
                };
                values.insert(token.trim_matches(|c| c == '{' || c == '}').to_string(), value.to_string());
            }
        }
    }

    Some(RecoveredTokens { values })
}

enum Segment {
    Literal(String),
    Token(String),
}

fn find_next_token(s: &str) -> Option<(&str, &str, &str)> {
    let mut best: Option<(usize, &str)> = None;
    for token in TOKENS {
        if let Some(pos) = s.find(token) {
            if best.map(|(b, _)| pos < b).unwrap_or(true) {
                best = Some((pos, token));
            }
        }
    }
    let (pos, token) = best?;
    Some((&s[..pos], token, &s[pos + token.len()..]))
}

impl RecoveredTokens {
    pub fn system_type(&self) -> Option<SystemType> {
        self.values.get("SystemType").and_then(|v| SystemType::parse(v))
    }
}
