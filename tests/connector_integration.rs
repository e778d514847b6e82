//! Multi-connector integration tests against in-process mock node agents.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ula_tools::config::ScreenDef;
use ula_tools::connector::{MultiConnector, SnapshotProvider};
use ula_tools::error::{Result, UlaError};

/// Provider stub: the command itself is the payload.
struct PassthroughProvider;

impl SnapshotProvider for PassthroughProvider {
    fn apply_for_node(&self, command: &str, _node_id: i32) -> Result<String> {
        Ok(command.to_string())
    }
}

/// Definition with two local nodes on the given agent ports.
fn two_node_def(port_a: u16, port_b: u16) -> ScreenDef {
    ScreenDef::from_json(&format!(
        r#"{{
            "virtual_screen_2d": {{
                "size": {{ "virtual_w": 2000, "virtual_h": 1000 }},
                "virtual_displays": [
                    {{ "disp_name": "left", "vdisplay_id": 1,
                       "virtual_x": 0, "virtual_y": 0, "virtual_w": 1000, "virtual_h": 1000 }},
                    {{ "disp_name": "right", "vdisplay_id": 2,
                       "virtual_x": 1000, "virtual_y": 0, "virtual_w": 1000, "virtual_h": 1000 }}
                ]
            }},
            "real_displays": [
                {{ "node_id": 0, "vdisplay_id": 1, "pixel_w": 1000, "pixel_h": 1000, "rdisplay_id": 0 }},
                {{ "node_id": 1, "vdisplay_id": 2, "pixel_w": 1000, "pixel_h": 1000, "rdisplay_id": 1 }}
            ],
            "node": [
                {{ "node_id": 0, "hostname": "a", "ip": "127.0.0.1" }},
                {{ "node_id": 1, "hostname": "b", "ip": "127.0.0.1" }}
            ],
            "distributed_window_system": {{
                "ula_client_manager": {{ "node_id": 0, "port": 10100 }},
                "framework_node": [
                    {{ "node_id": 0, "ula": {{ "port": {port_a} }} }},
                    {{ "node_id": 1, "ula": {{ "port": {port_b} }} }}
                ]
            }},
            "virtual_safety_area": []
        }}"#
    ))
    .unwrap()
}

/// Mock node agent answering every framed request with a fixed body.
async fn mock_agent(listener: TcpListener, response: &'static str) {
    loop {
        let Ok((mut conn, _)) = listener.accept().await else {
            return;
        };
        tokio::spawn(async move {
            loop {
                let mut magic = [0u8; 4];
                if conn.read_exact(&mut magic).await.is_err() {
                    return;
                }
                let mut len_buf = [0u8; 4];
                if conn.read_exact(&mut len_buf).await.is_err() {
                    return;
                }
                let mut body = vec![0u8; u32::from_be_bytes(len_buf) as usize];
                if conn.read_exact(&mut body).await.is_err() {
                    return;
                }

                let reply = response.as_bytes();
                let len = (reply.len() as u32).to_be_bytes();
                if conn.write_all(&len).await.is_err() || conn.write_all(reply).await.is_err() {
                    return;
                }
            }
        });
    }
}

/// Mock node agent that reads the request and never answers.
async fn hanging_agent(listener: TcpListener) {
    loop {
        let Ok((mut conn, _)) = listener.accept().await else {
            return;
        };
        tokio::spawn(async move {
            let mut sink = vec![0u8; 4096];
            loop {
                if conn.read(&mut sink).await.unwrap_or(0) == 0 {
                    return;
                }
            }
        });
    }
}

async fn bound_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// A local port nothing is listening on.
async fn dead_port() -> u16 {
    let (listener, port) = bound_listener().await;
    drop(listener);
    port
}

const COMMAND: &str = r#"{"command":"initial_vscreen","vlayer":[]}"#;
const OK_BODY: &str = r#"{"Type":"result","Result":0}"#;
const FAIL_BODY: &str = r#"{"Type":"result","Result":-1}"#;

#[tokio::test]
async fn all_nodes_reachable_and_successful() {
    let (la, pa) = bound_listener().await;
    let (lb, pb) = bound_listener().await;
    tokio::spawn(mock_agent(la, OK_BODY));
    tokio::spawn(mock_agent(lb, OK_BODY));

    let def = two_node_def(pa, pb);
    let conn = MultiConnector::new(&def, Arc::new(PassthroughProvider), false).unwrap();
    conn.connect().await.unwrap();

    let merged = conn.send_layout_command(COMMAND).await.unwrap();
    assert_eq!(merged.kind, "result");
    assert_eq!(merged.result, 0);
}

#[tokio::test]
async fn any_node_failure_fails_the_command() {
    let (la, pa) = bound_listener().await;
    let (lb, pb) = bound_listener().await;
    tokio::spawn(mock_agent(la, OK_BODY));
    tokio::spawn(mock_agent(lb, FAIL_BODY));

    let def = two_node_def(pa, pb);
    let conn = MultiConnector::new(&def, Arc::new(PassthroughProvider), false).unwrap();
    conn.connect().await.unwrap();

    assert!(conn.send_layout_command(COMMAND).await.is_err());
}

#[tokio::test]
async fn partial_connectivity_without_force_fails() {
    let (la, pa) = bound_listener().await;
    tokio::spawn(mock_agent(la, OK_BODY));
    let pb = dead_port().await;

    let def = two_node_def(pa, pb);
    let conn = MultiConnector::new(&def, Arc::new(PassthroughProvider), false).unwrap();

    let err = conn.connect().await.unwrap_err();
    assert!(matches!(err, UlaError::Connectivity(_)));

    // the send path applies the same rule
    let err = conn.send_layout_command(COMMAND).await.unwrap_err();
    assert!(matches!(err, UlaError::Connectivity(_)));
}

#[tokio::test]
async fn partial_connectivity_with_force_succeeds() {
    let (la, pa) = bound_listener().await;
    tokio::spawn(mock_agent(la, OK_BODY));
    let pb = dead_port().await;

    let def = two_node_def(pa, pb);
    let conn = MultiConnector::new(&def, Arc::new(PassthroughProvider), true).unwrap();
    conn.connect().await.unwrap();

    let merged = conn.send_layout_command(COMMAND).await.unwrap();
    assert_eq!(merged.result, 0);
}

#[tokio::test]
async fn no_node_reachable_fails_even_with_force() {
    let pa = dead_port().await;
    let pb = dead_port().await;

    let def = two_node_def(pa, pb);
    let conn = MultiConnector::new(&def, Arc::new(PassthroughProvider), true).unwrap();

    assert!(matches!(conn.connect().await, Err(UlaError::Connectivity(_))));
}

#[tokio::test]
async fn watchdog_fails_a_silent_node_after_about_a_second() {
    let (la, pa) = bound_listener().await;
    let (lb, pb) = bound_listener().await;
    tokio::spawn(mock_agent(la, OK_BODY));
    tokio::spawn(hanging_agent(lb));

    let def = two_node_def(pa, pb);
    let conn = MultiConnector::new(&def, Arc::new(PassthroughProvider), false).unwrap();
    conn.connect().await.unwrap();

    let started = Instant::now();
    let result = conn.send_layout_command(COMMAND).await;
    let elapsed = started.elapsed();

    // the hanging node contributes -1; the healthy node does not rescue it
    assert!(result.is_err());
    assert!(elapsed >= Duration::from_millis(900), "returned too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "watchdog too slow: {:?}", elapsed);
}
