//! Scope selection priority: a 403 challenge's scope wins, then the
//! intersection of Protected Resource Metadata's and the authorization
//! server's advertised scopes, then the AS's own advertised scopes, then
//! whatever the application configured on the provider.

/// Picks the scope string to request, per the priority order above. Each
/// `Option<&str>` is a space-separated scope list; `None` means that source
/// had nothing to offer.
pub fn select_scope(
    challenge_scope: Option<&str>,
    prm_scopes_supported: Option<&[String]>,
    server_advertised_scopes: Option<&[String]>,
    as_scopes_supported: Option<&[String]>,
    configured_scope: Option<&str>,
) -> Option<String> {
    if let Some(scope) = challenge_scope {
        return Some(scope.to_string());
    }

    if let (Some(prm), Some(advertised)) = (prm_scopes_supported, server_advertised_scopes) {
        let intersection: Vec<String> = prm.iter().filter(|s| advertised.contains(s)).cloned().collect();
        if !intersection.is_empty() {
            return Some(intersection.join(" "));
        }
    }

    if let Some(scopes) = as_scopes_supported {
        if !scopes.is_empty() {
            return Some(scopes.join(" "));
        }
    }

    configured_scope.map(str::to_string)
}
