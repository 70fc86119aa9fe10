use crate::core::config::data::{Config, ConfigKey};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        for line in self.describe_lines() {
            println!("  {line}");
        }
    }

    fn describe_lines(&self) -> Vec<String> {
        ConfigKey::ALL
            .into_iter()
            .map(|key| match self.get(key) {
                Some(value) => format!("{}: {value}", key.as_str()),
                None => format!("{}: (unset)", key.as_str()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_lines_marks_unset_values() {
        let config = Config {
            default_model: Some("gpt-5".to_string()),
            ..Default::default()
        };
        let lines = config.describe_lines();
        assert_eq!(lines.len(), ConfigKey::ALL.len());
        assert!(lines.contains(&"default-model: gpt-5".to_string()));
        assert!(lines.contains(&"verbosity: (unset)".to_string()));
    }
}
