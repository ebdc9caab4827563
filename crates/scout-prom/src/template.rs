//! Query templates with per-environment variables.
//!
//! Templates recognize `{{name}}` and `{{namespace}}`. Double braces
//! keep variables distinct from PromQL label matchers, which use single
//! braces. Unknown and unclosed variables are rejected at parse time so
//! misconfigured queries fail on startup, not mid-probe.

use crate::error::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Name,
    Namespace,
}

/// A parsed query template.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    segments: Vec<Segment>,
    has_variables: bool,
}

impl QueryTemplate {
    /// Parse a template, rejecting unknown variables.
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut has_variables = false;
        let mut literal = String::new();
        let mut rest = input;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            literal.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or(TemplateError::Unclosed(offset + start))?;
            let var = after[..end].trim();
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            match var {
                "name" => segments.push(Segment::Name),
                "namespace" => segments.push(Segment::Namespace),
                other => return Err(TemplateError::UnknownVariable(other.to_string())),
            }
            has_variables = true;
            offset += start + 2 + end + 2;
            rest = &after[end + 2..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            segments,
            has_variables,
        })
    }

    /// Whether the template references any variable.
    pub fn has_variables(&self) -> bool {
        self.has_variables
    }

    /// Expand the template for one environment.
    pub fn render(&self, name: &str, namespace: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Name => out.push_str(name),
                Segment::Namespace => out.push_str(namespace),
            }
        }
        out
    }
}
