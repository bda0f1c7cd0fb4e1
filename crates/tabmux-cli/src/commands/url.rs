//! `tabmux url <tab>`: print the socket URL of a tab.

use tabmux_client::{Endpoint, MuxResult, Target};

use crate::config::TabSpec;

pub fn run(endpoint: &Endpoint, tab: &TabSpec) -> MuxResult<String> {
    endpoint.url(&Target::new(tab.kind, &tab.instance, &tab.component))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_tab;

    #[test]
    fn logs_url() {
        let endpoint = Endpoint::new("wss://console.example.com/", "prod", "web");
        let tab = parse_tab("logs:web-0/app").unwrap();
        assert_eq!(
            run(&endpoint, &tab).unwrap(),
            "wss://console.example.com/api/container-apps/prod/web/logs/web-0/app"
        );
    }

    #[test]
    fn http_endpoint_rejected() {
        let endpoint = Endpoint::new("https://console.example.com", "prod", "web");
        let tab = parse_tab("shell:web-0/app").unwrap();
        assert!(run(&endpoint, &tab).is_err());
    }
}
