use super::{ConfigError, PyshipConfig};

fn invalid(field: impl Into<String>, problem: &'static str) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        problem,
    }
}

pub fn validate(config: &PyshipConfig) -> Result<(), ConfigError> {
    let app = [
        ("app.name", config.app.name.as_str()),
        ("app.repository", config.app.repository.as_str()),
        ("app.service_user", config.app.service_user.as_str()),
    ];
    for (field, value) in app {
        if value.is_empty() {
            return Err(invalid(field, "cannot be empty"));
        }
    }

    for (name, target) in &config.targets {
        let required = [
            ("site", target.site.as_str()),
            ("upstream", target.upstream.as_str()),
            ("available", target.available.as_str()),
            ("cert_name", target.cert_name.as_str()),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(invalid(
                    format!("targets.{}.{}", name, field),
                    "cannot be empty",
                ));
            }
        }

        if target.local_settings.as_os_str().is_empty() {
            return Err(invalid(
                format!("targets.{}.local_settings", name),
                "cannot be empty",
            ));
        }

        if target.hosts.is_empty() {
            return Err(invalid(
                format!("targets.{}.hosts", name),
                "no hosts defined",
            ));
        }

        for host in &target.hosts {
            let (_, address) = host.login("");
            if address.is_empty() {
                return Err(invalid(
                    format!("targets.{}.hosts", name),
                    "host with empty address",
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::fixtures::SAMPLE;
    use crate::config::{ConfigError, PyshipConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_target_without_hosts() {
        let broken = SAMPLE.replace(r#"hosts = [{ address = "162.242.221.143" }]"#, "");
        let err = broken.parse::<PyshipConfig>().unwrap_err();
        assert_eq!(err.to_string(), "targets.prod.hosts: no hosts defined");
    }

    #[test]
    fn rejects_empty_site() {
        let broken = SAMPLE.replace(r#"site = "citationsneeded.org""#, r#"site = """#);
        let err = broken.parse::<PyshipConfig>().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Invalid { field, .. }) if field == "targets.staging.site"
        ));
        assert_eq!(err.to_string(), "targets.staging.site: cannot be empty");
    }

    #[test]
    fn rejects_host_with_only_a_user() {
        let broken = SAMPLE.replace("mrterry@citationsneeded.org", "mrterry@");
        let err = broken.parse::<PyshipConfig>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "targets.staging.hosts: host with empty address"
        );
    }

    #[test]
    fn rejects_empty_app_name() {
        let broken = SAMPLE.replace(r#"name = "scipy2014""#, r#"name = """#);
        let err = broken.parse::<PyshipConfig>().unwrap_err();
        assert_eq!(err.to_string(), "app.name: cannot be empty");
    }
}
