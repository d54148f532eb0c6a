//! Hot-reload watcher for `channel(.<os>).json`.
//!
//! We watch the config's **directory** (not the file) because saving is often write temp →
//! rename/replace → delete old. Events are filtered down to channel config files and
//! forwarded as lightweight signals; the tick loop re-reads the config itself.

use crossbeam_channel::{unbounded, Receiver};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone)]
pub enum HotEvent {
    /// A channel config file was created, edited or replaced.
    ConfigChanged(PathBuf),
}

pub struct HotReload {
    _watcher: RecommendedWatcher,
    rx: Receiver<HotEvent>,
}

impl HotReload {
    pub fn rx(&self) -> &Receiver<HotEvent> {
        &self.rx
    }

    pub fn new(config_path: &Path) -> anyhow::Result<Self> {
        let (tx, rx) = unbounded::<HotEvent>();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(ev) = res {
                    for p in ev.paths {
                        if is_channel_config(&p) {
                            let _ = tx.send(HotEvent::ConfigChanged(p));
                        }
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_millis(250)),
        )?;

        let parent = config_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;

        Ok(Self { _watcher: watcher, rx })
    }
}

/// `channel.json` or `channel.<os>.json`.
fn is_channel_config(p: &Path) -> bool {
    let name = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
    name.starts_with("channel.") && name.ends_with(".json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_channel_configs_pass() {
        assert!(is_channel_config(Path::new("/a/assets/channel.json")));
        assert!(is_channel_config(Path::new("channel.macos.json")));
        assert!(!is_channel_config(Path::new("/a/assets/params.json")));
        assert!(!is_channel_config(Path::new("/a/assets/glsl")));
        assert!(!is_channel_config(Path::new("/a/assets/channel.json.swp")));
    }
}
