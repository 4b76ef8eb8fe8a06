// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

#[cfg(test)]
mod tests {
    use abstr_int::{ConfigError, WorklistOrder};

    use crate::config::RunConfig;

    #[test]
    fn test_set_conf_val() {
        let mut config = RunConfig::default();
        assert_eq!(config.threads, 4);
        config
            .set_conf_val(RunConfig::KEY_THREADS, "8")
            .expect("valid thread count");
        config
            .set_conf_val(RunConfig::KEY_ENTRIES, "0x1000, 0x2000,")
            .expect("valid entries");
        config
            .set_conf_val("absint.worklist", "shuffle:7")
            .expect("forwarded key");
        assert_eq!(config.threads, 8);
        assert_eq!(config.entries, vec![0x1000, 0x2000]);
        assert_eq!(config.absint.worklist_order, WorklistOrder::Shuffled(7));
        assert_eq!(
            config.get_conf_val(RunConfig::KEY_ENTRIES),
            Some("0x1000,0x2000".to_owned())
        );
        assert_eq!(
            config.get_conf_val("absint.clone_depth"),
            Some("2".to_owned())
        );
        assert_eq!(config.get_conf_val("absint.nothing"), None);
    }

    #[test]
    fn test_invalid_values() {
        let mut config = RunConfig::default();
        assert_eq!(
            config.set_conf_val(RunConfig::KEY_THREADS, "0"),
            Err(ConfigError::InvalidValue {
                key: RunConfig::KEY_THREADS.to_owned(),
                val: "0".to_owned()
            })
        );
        assert!(config.set_conf_val(RunConfig::KEY_TIMEOUT, "-1").is_err());
        assert!(config.set_conf_val(RunConfig::KEY_ENTRIES, "main").is_err());
        assert!(config.set_conf_val(RunConfig::KEY_LOG, " ").is_err());
        assert!(config.set_conf_val("absint.clone_depth", "0").is_err());
        assert_eq!(
            config.set_conf_val("provenance.color", "1"),
            Err(ConfigError::UnknownKey("provenance.color".to_owned()))
        );
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn test_from_text() {
        #[cfg_attr(rustfmt, rustfmt_skip)]
        let text = "
            # Analysis of the firmware image
            provenance.threads = 2
            provenance.timeout = 30

            provenance.log = debug
            absint.call_depth = 10
        ";
        let config = RunConfig::from_text(text).expect("valid config");
        assert_eq!(config.threads, 2);
        assert_eq!(config.timeout, 30);
        assert_eq!(config.log_spec, "debug");
        assert_eq!(config.absint.max_call_depth, 10);
        assert!(RunConfig::from_text("provenance.threads 2").is_err());
        assert!(RunConfig::from_text("absint.widen = 2").is_err());
    }
}
