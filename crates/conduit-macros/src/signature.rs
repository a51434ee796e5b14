//! Function-signature analysis shared by `#[tool]`, `#[prompt]`, and
//! `#[resource]`: which parameter (if any) is the `HandlerContext`, and
//! which remaining typed parameters make up the argument schema.
//!
//! Grounded on the donor's `tool.rs::analyze_function_signature` shape
//! (walk `sig.inputs`, special-case a context-shaped parameter, collect the
//! rest into named fields) — generalized here so `#[prompt]`/`#[resource]`
//! can reuse it instead of re-walking `Signature` themselves.

use syn::{FnArg, Pat, PatType, Signature, Type};

pub struct ArgField {
    pub ident: syn::Ident,
    pub ty: Type,
}

pub struct SignatureInfo {
    /// The identifier bound to the `HandlerContext` parameter, if the
    /// function takes one.
    pub context_binding: Option<syn::Ident>,
    pub args: Vec<ArgField>,
}

fn is_context_type(ty: &Type) -> bool {
    matches!(ty, Type::Path(p) if p.path.segments.last().is_some_and(|seg| seg.ident == "HandlerContext"))
}

pub fn analyze(sig: &Signature) -> syn::Result<SignatureInfo> {
    let mut context_binding = None;
    let mut args = Vec::new();

    for input in &sig.inputs {
        match input {
            FnArg::Receiver(_) => continue,
            FnArg::Typed(PatType { pat, ty, .. }) => {
                let Pat::Ident(pat_ident) = pat.as_ref() else {
                    return Err(syn::Error::new_spanned(pat, "handler parameters must be simple identifiers"));
                };
                if is_context_type(ty) {
                    context_binding = Some(pat_ident.ident.clone());
                } else {
                    args.push(ArgField { ident: pat_ident.ident.clone(), ty: (**ty).clone() });
                }
            }
        }
    }

    Ok(SignatureInfo { context_binding, args })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(src: &str) -> Signature {
        syn::parse_str::<syn::Signature>(src).unwrap()
    }

    #[test]
    fn collects_non_receiver_args_in_order() {
        let info = analyze(&sig("fn add(&self, a: i32, b: i32) -> i32")).unwrap();
        assert!(info.context_binding.is_none());
        let names: Vec<_> = info.args.iter().map(|a| a.ident.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn pulls_out_the_handler_context_parameter() {
        let info = analyze(&sig("fn add(&self, ctx: HandlerContext, a: i32) -> i32")).unwrap();
        assert_eq!(info.context_binding.unwrap().to_string(), "ctx");
        let names: Vec<_> = info.args.iter().map(|a| a.ident.to_string()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn recognizes_handler_context_regardless_of_path_prefix() {
        let info = analyze(&sig("fn status(&self, ctx: conduit_server::HandlerContext)")).unwrap();
        assert!(info.context_binding.is_some());
        assert!(info.args.is_empty());
    }

    #[test]
    fn no_args_beyond_receiver_is_fine() {
        let info = analyze(&sig("fn status(&self)")).unwrap();
        assert!(info.context_binding.is_none());
        assert!(info.args.is_empty());
    }

    #[test]
    fn rejects_destructured_patterns() {
        let result = analyze(&sig("fn add(&self, (a, b): (i32, i32))"));
        assert!(result.is_err());
    }
}
