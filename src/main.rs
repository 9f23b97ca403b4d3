pub mod api;
pub mod health_monitor;
pub mod metadata;
pub mod registry;

pub mod data_structs {
    pub mod device_meta;
    pub mod requests {
        pub mod sample_batch;
    }
    pub mod responses {
        pub mod anomaly_report;
        pub mod status_response;
    }
}

use std::fs::File;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use actix_web::middleware::Logger;
use yaml_rust::YamlLoader;

use crate::health_monitor::{HealthMonitorTable, MonitorSettings};
use crate::metadata::{DeviceInfoExtractor, MetadataExtractor};
use crate::registry::{DeviceRegistry, HttpDeviceRegistry};

pub struct SharedResources {
    registry: Arc<dyn DeviceRegistry>,
    extractor: Arc<dyn MetadataExtractor>,
    monitors: Arc<HealthMonitorTable>,
}

impl Clone for SharedResources {
    fn clone(&self) -> Self {
        return SharedResources {
            registry: self.registry.clone(),
            extractor: self.extractor.clone(),
            monitors: self.monitors.clone()
        }
    }
}

pub fn read_file_as_str(file_path: &str) -> String {
    let mut buf: String = String::new();
    let mut file = File::open(file_path)
        .expect("Error! A config.yml file was not found in the current directory.");
    file.read_to_string(&mut buf).expect("Error reading config.yml!");
    return buf;
}

fn load() -> SharedResources {
    println!("Loading configurations...");

    let buf: String = read_file_as_str("config.yml");
    let config = match YamlLoader::load_from_str(&buf) {
        Ok(config) => config,
        Err(_) => panic!("Error loading yml file")
    };
    let config = &config[0];

    let registry_config = &config["registry"];
    let base_url = registry_config["base-url"].as_str().expect("registry.base-url not found!");
    let timeout = registry_config["timeout-seconds"].as_i64().expect("registry.timeout-seconds not found!");

    let health_config = &config["health-monitor"];
    let settings = MonitorSettings {
        word_size: health_config["word-size"].as_i64()
            .expect("health-monitor.word-size not found!") as usize,
        window_factor: health_config["window-factor"].as_i64()
            .expect("health-monitor.window-factor not found!") as usize,
        lead_window_factor: health_config["lead-window-factor"].as_i64()
            .expect("health-monitor.lead-window-factor not found!") as usize,
        lag_window_factor: health_config["lag-window-factor"].as_i64()
            .expect("health-monitor.lag-window-factor not found!") as usize,
        prune_idle_seconds: health_config["prune-idle-seconds"].as_i64()
            .expect("health-monitor.prune-idle-seconds not found!"),
    };

    println!("Connecting to the device registry at {}", base_url);

    let registry: Arc<dyn DeviceRegistry> = Arc::new(
        HttpDeviceRegistry::new(base_url, Duration::from_secs(timeout as u64)));
    let extractor: Arc<dyn MetadataExtractor> = Arc::new(DeviceInfoExtractor);
    let monitors = Arc::new(HealthMonitorTable::new(settings));

    return SharedResources {
        registry,
        extractor,
        monitors
    };
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let shared_resources = load();
    let copied_resource = shared_resources.clone();

    println!("Starting monitor pruning task");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(10000));
        loop {
            let prune_start_time = Instant::now();
            let pruned = copied_resource.monitors
                .prune_idle(chrono::Local::now().timestamp()).await;
            if pruned > 0 {
                log::info!("Pruned {} idle device monitors", pruned);
            }
            let task_time = prune_start_time.elapsed().as_millis();
            // pruning walks every monitor, so a slow sweep means the table
            // has grown past what one interval can absorb
            if task_time > 9000 {
                log::warn!("Warning: prune task took {}ms to complete", task_time);
            }
            interval.tick().await;
        }
    });

    println!("Starting HTTP server...");
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(shared_resources.clone()))
            .wrap(Logger::new("%a \"%r\" %s %b \"%{User-Agent}i\" %T"))
            .wrap(Cors::permissive())
            .service(web::scope("/api/v1")
                .service(api::debug_ping)
                .service(api::get_device_meta)
                .service(api::push_samples)
                .service(api::monitor_status)
                .service(api::reset_monitor)
            )
    })
        .bind(("0.0.0.0", 8080))?
        .run()
        .await

}
