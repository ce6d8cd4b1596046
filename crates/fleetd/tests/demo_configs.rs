//! The configs shipped under `demos/local-cluster` must load and validate.

use std::path::PathBuf;
use std::time::Duration;

use fleet_core::FleetConfig;
use fleet_core::flatfile::read_flatfile;

fn demo_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/local-cluster")
}

#[test]
fn node_configs_load() {
    for port in [54321, 54322, 54323] {
        let path = demo_dir().join(format!("node-{port}.toml"));
        let config = FleetConfig::from_file(&path).unwrap();

        assert_eq!(config.node.address.port(), port);
        assert!(!config.node.client);
        assert!(config.membership.flatfile_enabled);
        assert_eq!(config.client_timeout().unwrap(), Duration::from_secs(5));
    }
}

#[test]
fn client_config_is_controlling() {
    let config = FleetConfig::from_file(&demo_dir().join("client.toml")).unwrap();

    assert!(config.local_node().is_controlling_client());
    assert!(config.heartbeat_interval().unwrap() < config.client_timeout().unwrap());
    assert_eq!(
        config.resolve_peers().unwrap(),
        vec!["127.0.0.1:54321".parse().unwrap()]
    );
}

#[test]
fn demo_flatfile_lists_three_nodes() {
    let peers = read_flatfile(&demo_dir().join("flatfile.txt")).unwrap();
    assert_eq!(peers.len(), 3);
}

#[test]
fn node_peers_exclude_self() {
    // The shipped configs use a workspace-relative flatfile path.
    let flatfile = demo_dir().join("flatfile.txt");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.toml");
    std::fs::write(
        &path,
        format!(
            "[node]\naddress = \"127.0.0.1:54322\"\n\n[membership]\nflatfile = {:?}\n",
            flatfile.display().to_string()
        ),
    )
    .unwrap();

    let config = FleetConfig::from_file(&path).unwrap();
    let mut peers = config.resolve_peers().unwrap();
    peers.sort();

    assert_eq!(
        peers,
        vec![
            "127.0.0.1:54321".parse().unwrap(),
            "127.0.0.1:54323".parse().unwrap()
        ]
    );
}
