#[cfg(test)]
pub mod simple_scenario {
  use std::process::{Child, Command};
  use std::time::Duration;

  use ntex::http::client::Client;
  use ntex::http::StatusCode;
  use serde_json::Value;

  const ADDR: &str = "127.0.0.1:19511";

  fn before_test() -> Child {
    let config_dir = std::env::temp_dir().join("magnum-api-scenario");
    Command::new(env!("CARGO_BIN_EXE_magnum-api"))
      .arg("-H")
      .arg(format!("tcp://{}", ADDR))
      .arg("--config-dir")
      .arg(config_dir)
      .spawn()
      .expect("Start magnum-api server")
  }

  #[ntex::test]
  async fn scenario() {
    let mut child = before_test();
    let client = Client::new();
    let url = format!("http://{}/", ADDR);
    let mut body = None;
    for _ in 0..50 {
      if let Ok(mut resp) = client.get(&url).send().await {
        assert_eq!(resp.status(), StatusCode::OK);
        body = resp.json::<Value>().await.ok();
        break;
      }
      ntex::time::sleep(Duration::from_millis(100)).await;
    }
    child.kill().unwrap();
    let body = body.expect("server never answered");
    assert_eq!(body["versions"][0]["id"], "v1");
  }
}
