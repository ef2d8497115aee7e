use borealis::{Borealis, RendererConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => match RendererConfig::load(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path);
                config
            }
            Err(e) => {
                log::error!("{}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => RendererConfig::default(),
    };

    if let Err(e) = Borealis::new().with_config(config).run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
