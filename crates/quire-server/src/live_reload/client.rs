//! Browser side of live reload.

use axum::http::header;
use axum::response::IntoResponse;

/// Client loaded by every page rendered in serve mode.
///
/// Reads the page URL from its own `data-path` attribute, subscribes, and
/// reconnects with backoff when the server goes away.
const CLIENT_SCRIPT: &str = r#"(function () {
  "use strict";
  var script = document.currentScript;
  var path = (script && script.dataset.path) || window.location.pathname;
  var delay = 500;

  function connect() {
    var scheme = window.location.protocol === "https:" ? "wss:" : "ws:";
    var socket = new WebSocket(scheme + "//" + window.location.host + "/ws/live-reload");

    socket.addEventListener("open", function () {
      delay = 500;
      socket.send(JSON.stringify({ type: "subscribe", path: path }));
    });

    socket.addEventListener("message", function (event) {
      var message;
      try {
        message = JSON.parse(event.data);
      } catch (err) {
        return;
      }
      if (message.type === "reload" && message.path === path) {
        window.location.reload();
      }
    });

    socket.addEventListener("close", function () {
      setTimeout(connect, delay);
      delay = Math.min(delay * 2, 5000);
    });
  }

  connect();
})();
"#;

pub(crate) async fn client_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_SCRIPT,
    )
}
