use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub supervisor: SupervisorOptions,
    pub process: ProcessSpec,
}

/// Supervisor configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorOptions {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Declaration for the supervised process.
///
/// This is the static record the supervisor consumes at startup: how to
/// launch the child, where its output goes, and how to restart it. It is
/// never mutated at runtime; changing it requires restarting supervision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub name: String,
    pub script: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    #[serde(default, deserialize_with = "de_args")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default = "default_autorestart")]
    pub autorestart: bool,
    #[serde(default)]
    pub watch: bool,
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default, with = "duration_ms")]
    pub restart_delay: Duration,
    #[serde(default = "default_min_uptime", with = "duration_ms")]
    pub min_uptime: Duration,
    #[serde(default = "default_kill_timeout", with = "duration_ms")]
    pub kill_timeout: Duration,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_file: Option<PathBuf>,
    #[serde(default)]
    pub merge_logs: bool,
}

impl SupervisorConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: SupervisorConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl ProcessSpec {
    /// Program and argument vector for the next launch.
    ///
    /// With an interpreter declared the script becomes the interpreter's
    /// first argument; otherwise the script is executed directly.
    pub fn argv(&self) -> (String, Vec<String>) {
        match &self.interpreter {
            Some(interpreter) => {
                let mut argv = Vec::with_capacity(self.args.len() + 1);
                argv.push(self.script.display().to_string());
                argv.extend(self.args.iter().cloned());
                (interpreter.clone(), argv)
            }
            None => (self.script.display().to_string(), self.args.clone()),
        }
    }

    /// Whether child output is captured to log files
    pub fn captures_output(&self) -> bool {
        self.out_file.is_some() || self.error_file.is_some()
    }
}

/// Arguments may be declared as one string (split on whitespace) or as a list
fn de_args<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Args {
        Line(String),
        List(Vec<String>),
    }

    Ok(match Args::deserialize(deserializer)? {
        Args::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        Args::List(list) => list,
    })
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_autorestart() -> bool {
    true
}

fn default_max_restarts() -> u32 {
    16
}

fn default_min_uptime() -> Duration {
    Duration::from_millis(1000)
}

fn default_kill_timeout() -> Duration {
    Duration::from_millis(1600)
}

// Durations are plain millisecond integers on the wire
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
supervisor:
  log_level: debug
process:
  name: chua-okx-monitor
  script: chua_ok_all.py
  interpreter: python
  args: --config config.okx.json
  autorestart: true
  watch: false
  max_restarts: 5
  restart_delay: 3000
  env:
    PYTHONUNBUFFERED: "1"
  out_file: log/okx-out.log
  error_file: log/okx-error.log
  merge_logs: true
"#;

    #[test]
    fn test_parse_full_declaration() {
        let config = SupervisorConfig::load_from_string(SAMPLE).unwrap();

        assert_eq!(config.supervisor.log_level, "debug");

        let spec = &config.process;
        assert_eq!(spec.name, "chua-okx-monitor");
        assert_eq!(spec.script, PathBuf::from("chua_ok_all.py"));
        assert_eq!(spec.interpreter.as_deref(), Some("python"));
        assert_eq!(spec.args, vec!["--config", "config.okx.json"]);
        assert!(spec.autorestart);
        assert!(!spec.watch);
        assert_eq!(spec.max_restarts, 5);
        assert_eq!(spec.restart_delay, Duration::from_secs(3));
        assert_eq!(spec.env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
        assert_eq!(spec.out_file, Some(PathBuf::from("log/okx-out.log")));
        assert_eq!(spec.error_file, Some(PathBuf::from("log/okx-error.log")));
        assert!(spec.merge_logs);
    }

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::load_from_string(
            "process:\n  name: worker\n  script: run.py\n",
        )
        .unwrap();

        assert_eq!(config.supervisor.log_level, "info");

        let spec = &config.process;
        assert!(spec.interpreter.is_none());
        assert!(spec.args.is_empty());
        assert!(spec.cwd.is_none());
        assert!(spec.autorestart);
        assert!(!spec.watch);
        assert_eq!(spec.max_restarts, 16);
        assert_eq!(spec.restart_delay, Duration::ZERO);
        assert_eq!(spec.min_uptime, Duration::from_millis(1000));
        assert_eq!(spec.kill_timeout, Duration::from_millis(1600));
        assert!(spec.env.is_empty());
        assert!(spec.out_file.is_none());
        assert!(!spec.merge_logs);
    }

    #[test]
    fn test_args_list_form() {
        let config = SupervisorConfig::load_from_string(
            "process:\n  name: worker\n  script: run.py\n  args:\n    - --config\n    - config with space.json\n",
        )
        .unwrap();

        assert_eq!(
            config.process.args,
            vec!["--config", "config with space.json"]
        );
    }

    #[test]
    fn test_argv_with_interpreter() {
        let config = SupervisorConfig::load_from_string(SAMPLE).unwrap();
        let (program, argv) = config.process.argv();

        assert_eq!(program, "python");
        assert_eq!(argv, vec!["chua_ok_all.py", "--config", "config.okx.json"]);
    }

    #[test]
    fn test_argv_without_interpreter() {
        let mut config = SupervisorConfig::load_from_string(SAMPLE).unwrap();
        config.process.interpreter = None;
        let (program, argv) = config.process.argv();

        assert_eq!(program, "chua_ok_all.py");
        assert_eq!(argv, vec!["--config", "config.okx.json"]);
    }

    #[test]
    fn test_args_redeploy_changes_next_launch() {
        // Changing only the args field changes the launch argument vector
        let config = SupervisorConfig::load_from_string(SAMPLE).unwrap();
        let redeployed =
            SupervisorConfig::load_from_string(&SAMPLE.replace("config.okx.json", "config.alt.json"))
                .unwrap();

        let (_, argv) = config.process.argv();
        let (_, new_argv) = redeployed.process.argv();
        assert_eq!(argv[2], "config.okx.json");
        assert_eq!(new_argv[2], "config.alt.json");
    }

    #[test]
    fn test_missing_script_rejected() {
        assert!(SupervisorConfig::load_from_string("process:\n  name: worker\n").is_err());
    }
}
