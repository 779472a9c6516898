//! Integration tests for Derivo

use derivo::config::Config;
use derivo::package::{PackageConfig, PackageKind};
use derivo::source::SourceImage;
use std::path::Path;
use tempfile::TempDir;

/// Root with a 400x300 `uploads/abc.jpg`, a catalogue and a config file
fn workspace() -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    std::fs::create_dir_all(root.join("uploads")).unwrap();
    let img = image::RgbImage::from_fn(400, 300, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    img.save(root.join("uploads/abc.jpg")).unwrap();

    let records = vec![
        SourceImage::new("abc", "uploads/abc.jpg", "jpg"),
        SourceImage::new("lost", "uploads/lost.jpg", "jpg"),
    ];
    std::fs::write(
        root.join("sources.json"),
        serde_json::to_string(&records).unwrap(),
    )
    .unwrap();

    let mut config = Config::default();
    config.server.root_path = root.to_path_buf();
    config.packages.insert(
        "full".to_string(),
        PackageConfig::new(PackageKind::Original).forcing("jpg"),
    );
    std::fs::write(
        root.join("config.toml"),
        toml::to_string_pretty(&config).unwrap(),
    )
    .unwrap();

    (dir, config)
}

fn config_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("config.toml")
}

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"cached").unwrap();
}

mod cli_tests {
    use super::*;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn derivo(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("derivo");
        cmd.arg("--config").arg(config_path(dir));
        cmd
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("derivo")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("derivative image cache"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("derivo")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("derivo"));
    }

    #[test]
    fn config_path_prints_override() {
        let (dir, _) = workspace();
        derivo(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let (dir, _) = workspace();
        derivo(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[server]"))
            .stdout(predicate::str::contains("[packages.thumb]"));
    }

    #[test]
    fn config_check_rejects_bad_package() {
        let (dir, _) = workspace();
        let broken = format!(
            "[server]\nroot_path = {:?}\n\n[packages.thumb]\ntype = \"recrop\"\n",
            dir.path().display().to_string()
        );
        std::fs::write(config_path(&dir), broken).unwrap();

        derivo(&dir)
            .args(["config", "check"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn resolve_prints_cache_path() {
        let (dir, _) = workspace();
        derivo(&dir)
            .args(["resolve", "abc", "thumb", "jpg"])
            .assert()
            .success()
            .stdout(predicate::str::contains("abc-thumb.jpg"));

        assert!(dir.path().join("data/images/abc-thumb.jpg").exists());
    }

    #[test]
    fn resolve_missing_source_fails() {
        let (dir, _) = workspace();
        derivo(&dir)
            .args(["resolve", "nope", "thumb", "jpg"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Source image not found: nope"));
    }

    #[test]
    fn request_unknown_package() {
        let (dir, _) = workspace();
        derivo(&dir)
            .args(["request", "GET", "/image/abc-huge.jpg"])
            .assert()
            .success()
            .stdout(predicate::str::contains("400"))
            .stdout(predicate::str::contains("pkg definition missing for huge"));
    }

    #[test]
    fn request_bad_extension() {
        let (dir, _) = workspace();
        derivo(&dir)
            .args(["request", "GET", "/image/abc-thumb.exe"])
            .assert()
            .success()
            .stdout(predicate::str::contains("invalid extension exe"));
    }

    #[test]
    fn request_unreadable_source() {
        let (dir, _) = workspace();
        derivo(&dir)
            .args(["request", "GET", "/image/lost-thumb.jpg"])
            .assert()
            .success()
            .stdout(predicate::str::contains("500"))
            .stdout(predicate::str::contains("File is missing!"));
    }

    #[test]
    fn purge_with_yes() {
        let (dir, config) = workspace();
        let images = config.images_dir();
        touch(&images.join("abc-thumb.jpg"));
        touch(&images.join("abc-full.jpg"));

        derivo(&dir)
            .args(["purge", "thumb", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Purged 1 file(s)"));

        assert!(!images.join("abc-thumb.jpg").exists());
        assert!(images.join("abc-full.jpg").exists());
    }

    #[test]
    fn invalidate_reports_count() {
        let (dir, config) = workspace();
        let images = config.images_dir();
        touch(&images.join("abc-thumb.png"));
        touch(&images.join("abc-full.jpg"));

        derivo(&dir)
            .args(["invalidate", "abc"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 2 derivative(s) of abc"));
    }

    #[test]
    fn urls_lists_packages() {
        let (dir, _) = workspace();
        derivo(&dir)
            .args(["urls", "abc"])
            .assert()
            .success()
            .stdout(predicate::str::contains("//localhost:13337/image/abc-full.jpg"))
            .stdout(predicate::str::contains("//localhost:13337/image/abc-thumb.jpg"));
    }
}

mod cache_tests {
    use super::*;
    use async_trait::async_trait;
    use derivo::cache::{CacheResolver, DerivativeKey, Invalidator};
    use derivo::config::ConfigManager;
    use derivo::distribute::{Distributor, NoopDistributor};
    use derivo::error::{DerivoError, DerivoResult};
    use derivo::http::{ImageService, ResponseBody};
    use derivo::source::{CatalogSourceStore, SourceStore};
    use derivo::transform::{EngineError, Pipeline, RasterEngine, TransformEngine};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingEngine {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TransformEngine for CountingEngine {
        async fn is_available(&self) -> bool {
            true
        }

        async fn render(
            &self,
            _source: &Path,
            pipeline: &Pipeline,
            output: &Path,
        ) -> Result<(), EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            tokio::fs::write(output, pipeline.format.as_bytes()).await?;
            Ok(())
        }

        fn engine_name(&self) -> &'static str {
            "counting"
        }
    }

    /// Records every distribution request
    #[derive(Default)]
    struct RecordingDistributor {
        seen: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    #[async_trait]
    impl Distributor for RecordingDistributor {
        async fn distribute(&self, from: &Path, to: &Path) -> DerivoResult<()> {
            self.seen
                .lock()
                .unwrap()
                .push((from.to_path_buf(), to.to_path_buf()));
            Err(DerivoError::DistributionFailed {
                path: from.to_path_buf(),
                reason: "peer offline".into(),
            })
        }
    }

    async fn service_with(
        config: &Config,
        engine: Arc<dyn TransformEngine>,
        distributor: Arc<dyn Distributor>,
    ) -> ImageService {
        let registry = Arc::new(ConfigManager::registry(config).unwrap());
        let sources: Arc<dyn SourceStore> =
            Arc::new(CatalogSourceStore::load(&config.catalog_path()).await.unwrap());
        let resolver = CacheResolver::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&sources),
            engine,
            distributor,
        );
        let invalidator = Invalidator::new(config, registry);
        ImageService::new(resolver, invalidator, sources)
    }

    async fn counting_service(config: &Config) -> (ImageService, Arc<CountingEngine>) {
        let engine = Arc::new(CountingEngine::default());
        let service = service_with(config, engine.clone(), Arc::new(NoopDistributor)).await;
        (service, engine)
    }

    #[tokio::test]
    async fn cache_hit_skips_engine() {
        let (_dir, config) = workspace();
        let (service, engine) = counting_service(&config).await;

        let first = service.handle("GET", "/image/abc-thumb.jpg").await;
        let second = service.handle("GET", "/image/abc-thumb.jpg").await;

        assert_eq!(first.status, 200);
        assert_eq!(first, second);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_flight_across_requests() {
        let (_dir, config) = workspace();
        let (service, engine) = counting_service(&config).await;

        let requests = (0..10).map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.handle("GET", "/image/abc-thumb.png").await })
        });
        let responses = futures_util::future::join_all(requests).await;

        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        for response in responses {
            let response = response.unwrap();
            assert_eq!(response.status, 200);
            assert_eq!(
                response.body,
                ResponseBody::File(config.images_dir().join("abc-thumb.png"))
            );
        }
    }

    #[tokio::test]
    async fn no_cache_regenerates() {
        let (_dir, config) = workspace();
        let (service, engine) = counting_service(&config).await;

        service.handle("GET", "/image/abc-thumb.jpg").await;
        service.handle("GET", "/image/abc-thumb.jpg?noCache=1").await;
        service.handle("GET", "/image/abc-thumb.jpg?noCache=0").await;

        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn delete_invalidates_then_regenerates() {
        let (_dir, config) = workspace();
        let (service, engine) = counting_service(&config).await;
        let images = config.images_dir();

        service.handle("GET", "/image/abc-thumb.jpg").await;
        service.handle("GET", "/image/abc-full.png").await;
        assert!(images.join("abc-thumb.jpg").exists());
        assert!(images.join("abc-full.jpg").exists());

        let deleted = service.handle("DELETE", "/image/abc").await;
        assert_eq!(deleted.status, 200);
        assert!(!images.join("abc-thumb.jpg").exists());
        assert!(!images.join("abc-full.jpg").exists());

        service.handle("GET", "/image/abc-thumb.jpg").await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn delete_unknown_source_is_404() {
        let (_dir, config) = workspace();
        let (service, _) = counting_service(&config).await;

        let response = service.handle("DELETE", "/image/nope").await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body, ResponseBody::Empty);
    }

    #[tokio::test]
    async fn purge_scope() {
        let (_dir, config) = workspace();
        let (service, _) = counting_service(&config).await;
        let images = config.images_dir();
        touch(&images.join("A-thumb.jpg"));
        touch(&images.join("A-full.jpg"));
        touch(&images.join("B-thumb.png"));

        let report = service.invalidator().purge_package("thumb").await.unwrap();

        assert_eq!(report.deleted.len(), 2);
        let remaining: Vec<String> = std::fs::read_dir(&images)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining, vec!["A-full.jpg".to_string()]);
    }

    #[tokio::test]
    async fn purge_flag_clears_package_before_serving() {
        let (_dir, config) = workspace();
        let (service, _) = counting_service(&config).await;
        let images = config.images_dir();
        let stale = images.join("other-thumb.gif");
        touch(&stale);

        let response = service.handle("GET", "/image/abc-thumb.jpg?purge=1").await;
        assert_eq!(response.status, 200);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn force_type_path_and_url() {
        let (_dir, config) = workspace();
        let (service, _) = counting_service(&config).await;

        let response = service.handle("GET", "/image/abc-full.png").await;
        let path = config.images_dir().join("abc-full.jpg");
        assert_eq!(response.body, ResponseBody::File(path.clone()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "jpg");

        let key = DerivativeKey::new("abc", "full", "png");
        assert_eq!(
            service.url_for(&key).unwrap(),
            "//localhost:13337/image/abc-full.jpg"
        );
    }

    #[tokio::test]
    async fn exe_is_rejected_without_side_effects() {
        let (_dir, config) = workspace();
        let (service, engine) = counting_service(&config).await;

        let response = service.handle("GET", "/image/abc-thumb.exe").await;

        assert_eq!(response.status, 400);
        assert_eq!(
            response.body,
            ResponseBody::Text("invalid extension exe".into())
        );
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert!(!config.images_dir().exists());
    }

    #[tokio::test]
    async fn missing_pieces_are_404() {
        let (_dir, config) = workspace();
        let (service, _) = counting_service(&config).await;

        for target in ["/image/abc-thumb", "/image/abc.jpg", "/elsewhere/abc-thumb.jpg"] {
            assert_eq!(service.handle("GET", target).await.status, 404, "{}", target);
        }
    }

    #[tokio::test]
    async fn unknown_source_is_404_without_cache_access() {
        let (_dir, config) = workspace();
        let (service, engine) = counting_service(&config).await;

        let response = service.handle("GET", "/image/nope-thumb.jpg").await;

        assert_eq!(response.status, 404);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert!(!config.images_dir().exists());
    }

    #[tokio::test]
    async fn distribution_failure_does_not_fail_request() {
        let (_dir, config) = workspace();
        let distributor = Arc::new(RecordingDistributor::default());
        let service = service_with(
            &config,
            Arc::new(CountingEngine::default()),
            distributor.clone(),
        )
        .await;

        let response = service.handle("GET", "/image/abc-thumb.jpg").await;
        assert_eq!(response.status, 200);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let path = config.images_dir().join("abc-thumb.jpg");
        assert_eq!(*distributor.seen.lock().unwrap(), vec![(path.clone(), path)]);
    }

    #[tokio::test]
    async fn raster_end_to_end() {
        let (_dir, config) = workspace();
        let service = service_with(
            &config,
            Arc::new(RasterEngine::new()),
            Arc::new(NoopDistributor),
        )
        .await;

        let response = service.handle("GET", "/image/abc-thumb.jpg").await;
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), "image/jpeg");

        let path = config.images_dir().join("abc-thumb.jpg");
        assert_eq!(image::image_dimensions(&path).unwrap(), (200, 200));
        let first = std::fs::read(&path).unwrap();

        let again = service.handle("GET", "/image/abc-thumb.jpg?noCache=1").await;
        assert_eq!(again.status, 200);
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }
}
