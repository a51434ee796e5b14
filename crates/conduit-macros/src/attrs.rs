//! Attribute-argument parsing for `#[tool]`/`#[prompt]`/`#[resource]`/`#[server]`.
//!
//! Each attribute accepts a leading string literal (the description, or the
//! resource's URI) followed by optional `key = "value"` pairs, mirroring the
//! donor macros' own `name = "..."` argument style rather than a full
//! `syn::Meta` derive — the argument grammar is small enough that a manual
//! comma-separated parse reads more plainly than a derive macro would.

use syn::parse::{Parse, ParseStream};
use syn::{LitStr, Token};

fn parse_key_value_tail(input: ParseStream) -> syn::Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    while !input.is_empty() {
        input.parse::<Token![,]>()?;
        if input.is_empty() {
            break;
        }
        let key: syn::Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        let value: LitStr = input.parse()?;
        pairs.push((key.to_string(), value.value()));
    }
    Ok(pairs)
}

/// `#[tool("description", title = "...", output_schema = "true")]`
pub struct ToolAttrs {
    pub description: String,
    pub title: Option<String>,
}

impl Parse for ToolAttrs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let description: LitStr = input.parse()?;
        let pairs = parse_key_value_tail(input)?;
        let title = pairs.into_iter().find(|(k, _)| k == "title").map(|(_, v)| v);
        Ok(Self { description: description.value(), title })
    }
}

/// `#[prompt("description")]`
pub struct PromptAttrs {
    pub description: String,
}

impl Parse for PromptAttrs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let description: LitStr = input.parse()?;
        let _ = parse_key_value_tail(input)?;
        Ok(Self { description: description.value() })
    }
}

/// `#[resource("scheme://path", mime_type = "text/plain")]`
pub struct ResourceAttrs {
    pub uri: String,
    pub mime_type: Option<String>,
}

impl Parse for ResourceAttrs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let uri: LitStr = input.parse()?;
        let pairs = parse_key_value_tail(input)?;
        let mime_type = pairs.into_iter().find(|(k, _)| k == "mime_type").map(|(_, v)| v);
        Ok(Self { uri: uri.value(), mime_type })
    }
}

/// `#[server(name = "...", version = "...", description = "...")]`
pub struct ServerAttrs {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
}

impl Parse for ServerAttrs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut name = None;
        let mut version = None;
        let mut description = None;
        let mut first = true;
        while !input.is_empty() {
            if !first {
                input.parse::<Token![,]>()?;
                if input.is_empty() {
                    break;
                }
            }
            first = false;
            let key: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let value: LitStr = input.parse()?;
            match key.to_string().as_str() {
                "name" => name = Some(value.value()),
                "version" => version = Some(value.value()),
                "description" => description = Some(value.value()),
                other => return Err(syn::Error::new(key.span(), format!("unknown #[server] argument '{other}'"))),
            }
        }
        Ok(Self { name, version, description })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_attrs_parses_description_only() {
        let attrs: ToolAttrs = syn::parse_str(r#""Add two numbers""#).unwrap();
        assert_eq!(attrs.description, "Add two numbers");
        assert_eq!(attrs.title, None);
    }

    #[test]
    fn tool_attrs_parses_trailing_title() {
        let attrs: ToolAttrs = syn::parse_str(r#""Add two numbers", title = "Add""#).unwrap();
        assert_eq!(attrs.description, "Add two numbers");
        assert_eq!(attrs.title, Some("Add".to_string()));
    }

    #[test]
    fn tool_attrs_requires_leading_string() {
        let result: syn::Result<ToolAttrs> = syn::parse_str(r#"title = "Add""#);
        assert!(result.is_err());
    }

    #[test]
    fn prompt_attrs_ignores_unknown_trailing_pairs() {
        let attrs: PromptAttrs = syn::parse_str(r#""Describe an addition", anything = "goes""#).unwrap();
        assert_eq!(attrs.description, "Describe an addition");
    }

    #[test]
    fn resource_attrs_parses_uri_and_mime_type() {
        let attrs: ResourceAttrs = syn::parse_str(r#""calc://status", mime_type = "text/plain""#).unwrap();
        assert_eq!(attrs.uri, "calc://status");
        assert_eq!(attrs.mime_type, Some("text/plain".to_string()));
    }

    #[test]
    fn resource_attrs_mime_type_defaults_to_none() {
        let attrs: ResourceAttrs = syn::parse_str(r#""calc://status""#).unwrap();
        assert_eq!(attrs.mime_type, None);
    }

    #[test]
    fn server_attrs_parses_all_fields_in_any_order() {
        let attrs: ServerAttrs =
            syn::parse_str(r#"version = "1.0.0", name = "calculator", description = "adds things""#).unwrap();
        assert_eq!(attrs.name, Some("calculator".to_string()));
        assert_eq!(attrs.version, Some("1.0.0".to_string()));
        assert_eq!(attrs.description, Some("adds things".to_string()));
    }

    #[test]
    fn server_attrs_allows_empty_argument_list() {
        let attrs: ServerAttrs = syn::parse_str("").unwrap();
        assert_eq!(attrs.name, None);
        assert_eq!(attrs.version, None);
        assert_eq!(attrs.description, None);
    }

    #[test]
    fn server_attrs_rejects_unknown_key() {
        let result: syn::Result<ServerAttrs> = syn::parse_str(r#"nickname = "calc""#);
        assert!(result.is_err());
    }
}
