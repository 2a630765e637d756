//! Series bookkeeping for add/remove, including concurrent callers.

use std::collections::BTreeMap;
use std::sync::Arc;

use rstest::rstest;

use vc_metrics::{Entry, Metrics, METRIC_NAME};

type Labels = BTreeMap<String, String>;

/// Every exported series of the version gauge, as label maps.
fn series(metrics: &Metrics) -> Vec<Labels> {
    metrics
        .registry()
        .gather()
        .iter()
        .filter(|family| family.get_name() == METRIC_NAME)
        .flat_map(|family| family.get_metric().iter())
        .map(|metric| {
            metric
                .get_label()
                .iter()
                .map(|pair| (pair.get_name().to_string(), pair.get_value().to_string()))
                .collect()
        })
        .collect()
}

fn labels_of(entry: &Entry) -> Labels {
    [
        ("namespace", &entry.namespace),
        ("pod", &entry.pod),
        ("container", &entry.container),
        ("image", &entry.image_url),
        ("current_version", &entry.current_version),
        ("latest_version", &entry.latest_version),
        ("architecture", &entry.arch),
        ("os", &entry.os),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.clone()))
    .collect()
}

fn entry(namespace: &str, pod: &str, container: &str) -> Entry {
    Entry {
        namespace: namespace.into(),
        pod: pod.into(),
        container: container.into(),
        image_url: "docker.io/library/eclipse-mosquitto".into(),
        is_latest: false,
        current_version: "2.0.14".into(),
        latest_version: "2.0.18".into(),
        os: "linux".into(),
        arch: "arm64".into(),
    }
}

#[tokio::test]
async fn test_add_then_remove_leaves_nothing() {
    let metrics = Metrics::new().unwrap();
    let e = entry("default", "mqtt-0", "broker");

    metrics.add_image(&e).await;
    assert_eq!(series(&metrics), vec![labels_of(&e)]);
    assert!(metrics.is_tracked("default", "mqtt-0", "broker").await);

    metrics.remove_image("default", "mqtt-0", "broker").await;
    assert!(series(&metrics).is_empty());
    assert!(!metrics.is_tracked("default", "mqtt-0", "broker").await);
    assert_eq!(metrics.tracked_containers().await, 0);
}

#[rstest]
#[case::image("image")]
#[case::current_version("current_version")]
#[case::latest_version("latest_version")]
#[case::os("os")]
#[case::arch("arch")]
#[tokio::test]
async fn test_readd_replaces_series(#[case] changed: &str) {
    let metrics = Metrics::new().unwrap();

    let a = entry("default", "mqtt-0", "broker");
    let mut b = a.clone();
    match changed {
        "image" => b.image_url = "ghcr.io/example/mosquitto".into(),
        "current_version" => b.current_version = "2.0.18".into(),
        "latest_version" => b.latest_version = "2.0.19".into(),
        "os" => b.os = "windows".into(),
        "arch" => b.arch = "amd64".into(),
        other => unreachable!("unknown label {other}"),
    }
    b.is_latest = true;

    metrics.add_image(&a).await;
    metrics.add_image(&b).await;

    let exported = series(&metrics);
    assert_eq!(exported, vec![labels_of(&b)]);
    assert!(!exported.contains(&labels_of(&a)));
    assert_eq!(metrics.tracked_containers().await, 1);
}

#[tokio::test]
async fn test_remove_uses_recorded_labels() {
    let metrics = Metrics::new().unwrap();

    let a = entry("default", "mqtt-0", "broker");
    let mut b = a.clone();
    b.current_version = "2.0.18".into();

    metrics.add_image(&a).await;
    metrics.add_image(&b).await;
    metrics.remove_image("default", "mqtt-0", "broker").await;

    assert!(series(&metrics).is_empty());
}

#[tokio::test]
async fn test_remove_unknown_is_noop() {
    let metrics = Metrics::new().unwrap();
    let e = entry("default", "mqtt-0", "broker");
    metrics.add_image(&e).await;

    metrics.remove_image("default", "mqtt-1", "broker").await;
    metrics.remove_image("kube-system", "coredns", "coredns").await;

    assert_eq!(series(&metrics), vec![labels_of(&e)]);
    assert_eq!(metrics.tracked_containers().await, 1);
}

#[tokio::test]
async fn test_remove_twice_is_noop() {
    let metrics = Metrics::new().unwrap();
    metrics.add_image(&entry("default", "mqtt-0", "broker")).await;

    metrics.remove_image("default", "mqtt-0", "broker").await;
    metrics.remove_image("default", "mqtt-0", "broker").await;

    assert!(series(&metrics).is_empty());
}

#[tokio::test]
async fn test_shifted_identity_boundaries_do_not_alias() {
    let metrics = Metrics::new().unwrap();

    let first = entry("ab", "c", "d");
    let second = entry("a", "bc", "d");
    metrics.add_image(&first).await;
    metrics.add_image(&second).await;

    assert_eq!(metrics.tracked_containers().await, 2);
    assert_eq!(series(&metrics).len(), 2);

    metrics.remove_image("a", "bc", "d").await;
    assert_eq!(series(&metrics), vec![labels_of(&first)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_updates_on_disjoint_identities() {
    const CONTAINERS: usize = 64;
    const ROUNDS: usize = 50;

    let metrics = Arc::new(Metrics::new().unwrap());

    let mut handles = Vec::with_capacity(CONTAINERS);
    for i in 0..CONTAINERS {
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(async move {
            let pod = format!("pod-{i}");
            for round in 0..ROUNDS {
                let mut e = entry("stress", &pod, "app");
                e.current_version = format!("1.0.{round}");
                e.is_latest = round % 2 == 0;
                metrics.add_image(&e).await;

                // Never on the final round, so even pods keep their last entry.
                if round % 5 == 0 {
                    metrics.remove_image("stress", &pod, "app").await;
                }
                tokio::task::yield_now().await;
            }

            if i % 2 == 1 {
                metrics.remove_image("stress", &pod, "app").await;
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let exported = series(&metrics);
    assert_eq!(exported.len(), CONTAINERS / 2);
    assert_eq!(metrics.tracked_containers().await, CONTAINERS / 2);

    for i in (0..CONTAINERS).step_by(2) {
        let mut expected = entry("stress", &format!("pod-{i}"), "app");
        expected.current_version = format!("1.0.{}", ROUNDS - 1);
        assert!(
            exported.contains(&labels_of(&expected)),
            "missing final series for pod-{i}"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_replacements_on_one_identity() {
    const WRITERS: usize = 64;
    const ROUNDS: usize = 50;

    let metrics = Arc::new(Metrics::new().unwrap());

    let mut handles = Vec::with_capacity(WRITERS);
    for writer in 0..WRITERS {
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(async move {
            for round in 0..ROUNDS {
                let mut e = entry("shared", "web-0", "nginx");
                e.image_url = format!("registry.example/writer-{writer}/nginx");
                e.current_version = format!("{writer}.{round}");
                metrics.add_image(&e).await;
                tokio::task::yield_now().await;
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let exported = series(&metrics);
    assert_eq!(exported.len(), 1, "{exported:?}");
    assert_eq!(metrics.tracked_containers().await, 1);

    // The survivor is one writer's entry, never a mix of two.
    let survivor = &exported[0];
    let version = &survivor["current_version"];
    let (writer, _) = version.split_once('.').unwrap();
    assert_eq!(
        survivor["image"],
        format!("registry.example/writer-{writer}/nginx")
    );

    metrics.remove_image("shared", "web-0", "nginx").await;
    assert!(series(&metrics).is_empty());
}
