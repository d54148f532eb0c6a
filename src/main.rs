mod hotreload;
mod params;
mod reconnect;
mod stream;
mod validate;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;

use hydrawarp_engine::assets::write_shader_asset;
use hydrawarp_engine::{
    load_channel_config, loge, logging, logi, logw, AssetsRoot, ChannelConfig, ConfigMode, ControlChannel,
    LoadedChannelConfig,
};

use crate::hotreload::{HotEvent, HotReload};
use crate::params::{label, ParamStore, SharedParams};
use crate::reconnect::Reconnect;

/// Command line: `[--log-file <path>] [--url <ws-url>] [--ticks <n>] [--strict]`
#[derive(Debug, Default)]
struct Args {
    log_file: Option<PathBuf>,
    url: Option<String>,
    ticks: Option<u64>,
    strict: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--log-file" => args.log_file = it.next().map(PathBuf::from),
            "--url" => args.url = it.next(),
            "--ticks" => args.ticks = it.next().and_then(|n| n.parse().ok()),
            "--strict" => args.strict = true,
            other => eprintln!("ignoring unknown argument '{other}'"),
        }
    }
    if args.log_file.is_none() {
        if let Ok(p) = std::env::var("HYDRAWARP_LOG_FILE") {
            if !p.trim().is_empty() {
                args.log_file = Some(PathBuf::from(p));
            }
        }
    }
    args
}

/// Config file plus env/CLI endpoint overrides (CLI wins).
fn effective_config(loaded: &LoadedChannelConfig, args: &Args) -> ChannelConfig {
    let mut cfg = loaded.config.clone();
    if cfg.websocket.apply_env_override() {
        logi!("CONFIG", "endpoint overridden by HYDRAWARP_WS_URL");
    }
    if let Some(url) = &args.url {
        cfg.websocket.url = Some(url.clone());
    }
    cfg
}

fn run_validation(loaded: &LoadedChannelConfig) {
    match &loaded.raw {
        Some(raw) => {
            let issues = validate::validate_channel_json(raw);
            validate::emit_issues("CONFIG", &issues);
            validate::emit_summary("CONFIG", "channel.json", &issues);
        }
        None => logi!("CONFIG", "{} not found, using defaults", loaded.path.display()),
    }
}

/// Reconnecting only applies to a channel that connects on its own.
fn reconnect_interval(cfg: &ChannelConfig) -> Option<Duration> {
    if cfg.websocket.auto_connect {
        cfg.websocket.reconnect_interval()
    } else {
        None
    }
}

fn tick_period(hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(hz.clamp(1, 1000)))
}

/// Hand everything the channel received since the last tick to its consumer.
fn drain_received(channel: &mut ControlChannel, assets: &AssetsRoot) {
    if let Some(status) = channel.take_status() {
        logi!("WS", "status: {status}");
    }

    if let Some(src) = channel.take_fragment_shader() {
        logi!("WS", "fragment shader received ({} bytes)", src.len());
    }

    if let Some(desc) = channel.take_uniforms() {
        logi!("WS", "uniform descriptor received ({} bytes)", desc.len());
    }

    if let Some(frame) = channel.take_stream_frame() {
        match stream::decode_frame(&frame) {
            Ok(img) => logi!("STREAM", "frame {:?}, {} bytes", img.kind, img.bytes.len()),
            Err(e) => logw!("STREAM", "undecodable frame ({} chars): {e}", frame.len()),
        }
    }

    if let Some(asset) = channel.take_shader_asset() {
        match write_shader_asset(assets, &asset) {
            Ok(w) => {
                if let Some(r) = &w.received {
                    logi!("ASSETS", "wrote {}", r.display());
                }
                logi!("ASSETS", "wrote {}", w.processed.display());
            }
            Err(e) => loge!("ASSETS", "shader '{}' not saved: {e}", asset.title),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = parse_args();

    let run_id = logging::init(args.log_file.clone());
    logi!("INIT", "run_id={run_id}");

    let cwd = std::env::current_dir().context("reading current directory")?;
    let assets = match AssetsRoot::discover(&cwd) {
        Ok(a) => a,
        Err(e) => {
            logw!("INIT", "{e}; using ./assets");
            AssetsRoot::create(cwd.join("assets")).context("creating ./assets")?
        }
    };
    logi!("INIT", "assets base: {}", assets.path().display());

    let mode = if args.strict { ConfigMode::Strict } else { ConfigMode::Lenient };
    let loaded = load_channel_config(&assets, mode).context("loading channel config")?;
    logi!("INIT", "assets channel.json: {}", loaded.path.display());
    run_validation(&loaded);

    let mut cfg = effective_config(&loaded, &args);
    let mut tick = tick_period(cfg.host.tick_hz);

    let store = Arc::new(Mutex::new(ParamStore::new(cfg.host.smoothing)));
    let mut channel = ControlChannel::new(
        &cfg.websocket,
        Box::new(SharedParams(store.clone())),
        Box::new(assets.clone()),
    );
    logi!("INIT", "endpoint: {}", channel.endpoint());

    let mut reconnect = Reconnect::new(reconnect_interval(&cfg));
    if cfg.websocket.auto_connect {
        channel.connect();
    }

    let hot = match HotReload::new(&loaded.path) {
        Ok(h) => Some(h),
        Err(e) => {
            logw!("WATCH", "hot reload disabled: {e}");
            None
        }
    };

    let mut ticks: u64 = 0;
    loop {
        if args.ticks.is_some_and(|max| ticks >= max) {
            break;
        }
        let started = Instant::now();

        channel.update();
        drain_received(&mut channel, &assets);

        if let Ok(mut s) = store.lock() {
            s.tick();
        }

        if reconnect.due(channel.state(), channel.is_attempt_pending(), started) {
            channel.connect();
        }

        if let Some(h) = &hot {
            let mut changed = false;
            while let Ok(HotEvent::ConfigChanged(p)) = h.rx().try_recv() {
                logi!("WATCH", "changed: {}", p.display());
                changed = true;
            }
            if changed {
                match load_channel_config(&assets, mode) {
                    Ok(reloaded) => {
                        run_validation(&reloaded);
                        let next = effective_config(&reloaded, &args);
                        let endpoint = next.websocket.endpoint();
                        if endpoint != channel.endpoint() {
                            logi!("CONFIG", "endpoint changed -> {endpoint}");
                            channel.connect_to(&endpoint);
                        }
                        if next.websocket.read_timeout_ms != cfg.websocket.read_timeout_ms
                            || next.websocket.ping_interval_ms != cfg.websocket.ping_interval_ms
                            || next.websocket.relay_live_code != cfg.websocket.relay_live_code
                        {
                            logw!("CONFIG", "socket settings changed; restart to apply them");
                        }
                        reconnect.set_interval(reconnect_interval(&next));
                        tick = tick_period(next.host.tick_hz);
                        if let Ok(mut s) = store.lock() {
                            s.set_smoothing(next.host.smoothing);
                        }
                        cfg = next;
                    }
                    Err(e) => loge!("CONFIG", "reload failed, keeping previous config: {e}"),
                }
            }
        }

        ticks += 1;
        std::thread::sleep(tick.saturating_sub(started.elapsed()));
    }

    channel.disconnect();
    drain_received(&mut channel, &assets);

    if let Ok(s) = store.lock() {
        for (index, value) in s.values() {
            logi!("PARAMS", "final {} = {value:.3}", label(index));
        }
        for (index, v) in s.vec4_values() {
            logi!("PARAMS", "final vec4 {index} = {v:?}");
        }
        for (warp, slot, source) in s.slots() {
            logi!("PARAMS", "final warp {warp} slot {slot} <- {source:?}");
        }
    }
    logi!("INIT", "exiting after {ticks} ticks");
    Ok(())
}
