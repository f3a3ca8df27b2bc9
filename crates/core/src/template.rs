use crate::metadata::PhotoMetadata;
use crate::sanitize::sanitize_component;
use chrono::Datelike;
use chrono::Timelike;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Token(Token),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Sequence,
    Artist,
    Make,
    Model,
    Folder,
    File,
}

impl Token {
    pub const ALL: [Token; 12] = [
        Token::Year,
        Token::Month,
        Token::Day,
        Token::Hour,
        Token::Minute,
        Token::Second,
        Token::Sequence,
        Token::Artist,
        Token::Make,
        Token::Model,
        Token::Folder,
        Token::File,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Token::Year => "YYYY",
            Token::Month => "MM",
            Token::Day => "DD",
            Token::Hour => "hh",
            Token::Minute => "mm",
            Token::Second => "ss",
            Token::Sequence => "Seq",
            Token::Artist => "Artist",
            Token::Make => "Make",
            Token::Model => "Model",
            Token::Folder => "Folder",
            Token::File => "File",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Token::Year => "Year",
            Token::Month => "Month",
            Token::Day => "Day",
            Token::Hour => "Hours",
            Token::Minute => "Minutes",
            Token::Second => "Seconds",
            Token::Sequence => "Sequence number",
            Token::Artist => "Artist",
            Token::Make => "Camera Make",
            Token::Model => "Camera Model",
            Token::Folder => "Parent folder of the image file",
            Token::File => "Current Filename",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("format string is empty")]
    Empty,
    #[error("format string has unbalanced braces")]
    UnbalancedBraces,
    #[error("unknown token in format string: {{{0}}}")]
    UnknownToken(String),
}

pub fn validate_template(input: &str) -> Result<(), TemplateError> {
    parse_template(input).map(|_| ())
}

pub fn parse_template(input: &str) -> Result<Vec<TemplatePart>, TemplateError> {
    if input.is_empty() {
        return Err(TemplateError::Empty);
    }

    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                }
                let mut token = String::new();
                let mut found_close = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        found_close = true;
                        break;
                    }
                    if next == '{' {
                        return Err(TemplateError::UnbalancedBraces);
                    }
                    token.push(next);
                }
                if !found_close || token.is_empty() {
                    return Err(TemplateError::UnbalancedBraces);
                }
                parts.push(TemplatePart::Token(parse_token(&token)?));
            }
            '}' => return Err(TemplateError::UnbalancedBraces),
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }

    Ok(parts)
}

pub fn uses_token(parts: &[TemplatePart], token: Token) -> bool {
    parts
        .iter()
        .any(|part| matches!(part, TemplatePart::Token(t) if *t == token))
}

/// Renders the stem of the new file name. `sequence` is the already padded value.
pub fn render_template(parts: &[TemplatePart], metadata: &PhotoMetadata, sequence: &str) -> String {
    let mut output = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(s) => output.push_str(s),
            TemplatePart::Token(token) => {
                let value = match token {
                    Token::Year => format!("{:04}", metadata.date.year()),
                    Token::Month => format!("{:02}", metadata.date.month()),
                    Token::Day => format!("{:02}", metadata.date.day()),
                    Token::Hour => format!("{:02}", metadata.date.hour()),
                    Token::Minute => format!("{:02}", metadata.date.minute()),
                    Token::Second => format!("{:02}", metadata.date.second()),
                    Token::Sequence => sequence.to_string(),
                    Token::Artist => metadata.normalized_artist().unwrap_or_default().to_string(),
                    Token::Make => metadata
                        .normalized_camera_make()
                        .unwrap_or_default()
                        .to_string(),
                    Token::Model => metadata
                        .normalized_camera_model()
                        .unwrap_or_default()
                        .to_string(),
                    Token::Folder => metadata.folder.clone(),
                    Token::File => metadata.original_name.clone(),
                };
                output.push_str(&sanitize_component(&value));
            }
        }
    }

    output
}

fn parse_token(token: &str) -> Result<Token, TemplateError> {
    Token::ALL
        .into_iter()
        .find(|t| t.name() == token)
        .ok_or_else(|| TemplateError::UnknownToken(token.to_string()))
}
