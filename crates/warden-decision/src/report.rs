//! Decision rendering for operator tooling.

use warden_core::{Error, Result};

use crate::decision::Decision;

/// Renders decisions for operator consumption.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionReporter;

impl DecisionReporter {
    /// Render a decision as JSON. Lossless: every metadata field,
    /// including the PDP version, survives the round trip, so diverging
    /// client and server versions stay debuggable.
    pub fn to_json(decision: &Decision) -> Result<String> {
        serde_json::to_string_pretty(decision)
            .map_err(|e| Error::internal(format!("encode decision: {e}")))
    }

    /// Render a decision as console text.
    pub fn render_text(decision: &Decision) -> String {
        match decision {
            Decision::Permit(p) => {
                let mut out = String::from("PERMIT\n");
                if !p.logins.is_empty() {
                    out.push_str(&format!("  logins:                  {}\n", p.logins.join(", ")));
                }
                out.push_str(&format!("  max session ttl:         {}\n", p.max_session_ttl));
                out.push_str(&format!("  agent forwarding:        {}\n", p.forward_agent));
                out.push_str(&format!("  port forwarding:         {}\n", p.port_forwarding));
                match p.client_idle_timeout {
                    Some(timeout) => {
                        out.push_str(&format!("  client idle timeout:     {timeout}\n"));
                    }
                    None => out.push_str("  client idle timeout:     none\n"),
                }
                out.push_str(&format!(
                    "  disconnect expired cert: {}\n",
                    p.disconnect_expired_cert
                ));
                out.push_str(&format!("  pdp version:             {}\n", p.pdp_version));
                out
            }
            Decision::Denial(d) => {
                format!("DENIED: {} (pdp version {})\n", d.message, d.pdp_version)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{PermitMetadata, PDP_VERSION};
    use time::Duration;

    fn permit() -> Decision {
        Decision::Permit(PermitMetadata {
            logins: vec!["ubuntu".into(), "deploy".into()],
            max_session_ttl: Duration::minutes(30),
            forward_agent: true,
            port_forwarding: false,
            client_idle_timeout: Some(Duration::minutes(15)),
            disconnect_expired_cert: true,
            pdp_version: PDP_VERSION.to_string(),
        })
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let decision = permit();
        let json = DecisionReporter::to_json(&decision).unwrap();
        let restored: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, decision);
        assert!(json.contains("pdp_version"));
    }

    #[test]
    fn text_rendering_names_the_outcome() {
        let text = DecisionReporter::render_text(&permit());
        assert!(text.starts_with("PERMIT"));
        assert!(text.contains("ubuntu, deploy"));

        let text = DecisionReporter::render_text(&Decision::denial("device trust required"));
        assert!(text.starts_with("DENIED: device trust required"));
        assert!(text.contains(PDP_VERSION));
    }
}
