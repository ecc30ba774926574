// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a commented shipline.yml template.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::AppName;

use super::CONFIG_FILENAME;

pub fn init_config(dir: &Path, app: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let app = match app {
        Some(name) => AppName::new(name).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => app_from_dir(dir)?,
    };

    std::fs::write(&config_path, template_yaml(&app))?;
    Ok(())
}

/// The directory name, lowercased, if it is a valid app name; `my-app` otherwise.
fn app_from_dir(dir: &Path) -> Result<AppName> {
    let derived = dir
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| AppName::new(&name.to_lowercase()).ok());
    match derived {
        Some(app) => Ok(app),
        None => AppName::new("my-app").map_err(|e| Error::InvalidConfig(e.to_string())),
    }
}

pub fn template_yaml(app: &AppName) -> String {
    format!(
        r#"app: {app}
version: 0.1.0

stamp:
  # Files rewritten with version, build timestamp and commit before the build
  # and restored afterwards.
  files:
    - path: lib/version.dart
      format: assignments
    - path: assets/version.json
      format: json
  # snapshot_dir: .shipline

build:
  command: [flutter, build]
  output_dir: build/linux/x64/release/bundle
  primary_executable: {app}
  # timeout: 30m

package:
  output_dir: dist
  # arch: x64

# deploy:
#   server: deploy@server.example.com
#   # SSH host key verification (default: false)
#   # Set to true to enable Trust-On-First-Use, or pre-populate ~/.ssh/known_hosts
#   # trust_first_connection: true
#   remote_dir: /opt/{app}
#   branch: main
#   push_timeout: 2m
#   restart: [docker, compose, up, -d, --build]
#   container: {app}-web
#   health:
#     url: http://server.example.com/health
#     process_interval: 1s
#     process_timeout: 10s

# daemon:
#   port_file: ~/.config/{app}/tray_port
#   discovery_timeout: 10s
#   request_timeout: 2s
#   idle_timeout: 60s
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn template_parses() {
        let app = AppName::new("demo").unwrap();
        let config = Config::from_yaml(&template_yaml(&app)).unwrap();
        assert_eq!(config.app, app);
        assert_eq!(config.stamp.files.len(), 2);
        assert!(config.deploy.is_none());
    }
}
