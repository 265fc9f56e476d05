//! WebSocket transport: bridges browser socket callbacks to a `TransportSink`.
//!
//! Each socket owns its four handler `Closure`s. Closing (or dropping) the
//! transport detaches them from the socket and frees them, so a reconnect
//! loop against a dead server does not pile up handlers.

use std::cell::RefCell;

use js_sys::{ArrayBuffer, Uint8Array};
use wasm_bindgen::prelude::*;
use web_sys::{BinaryType, CloseEvent, Event, MessageEvent, WebSocket};

use bookbridge_core::ports::{Transport, TransportEvent, TransportPort, TransportSink};
use bookbridge_types::{ChatError, Result};

/// Opens browser WebSockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransportFactory;

impl WebSocketTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

impl TransportPort for WebSocketTransportFactory {
    fn connect(&self, url: &str, sink: TransportSink) -> Result<Box<dyn Transport>> {
        let socket = WebSocket::new(url)
            .map_err(|e| ChatError::JsInterop(format!("Failed to create WebSocket: {:?}", e)))?;
        socket.set_binary_type(BinaryType::Arraybuffer);

        let handlers = SocketHandlers::new(sink);
        handlers.attach(&socket);

        log::debug!("WebSocket created for {}", redact_token(url));
        Ok(Box::new(WebSocketTransport {
            socket,
            handlers: RefCell::new(Some(handlers)),
        }))
    }
}

struct SocketHandlers {
    onopen: Closure<dyn FnMut(Event)>,
    onmessage: Closure<dyn FnMut(MessageEvent)>,
    onerror: Closure<dyn FnMut(Event)>,
    onclose: Closure<dyn FnMut(CloseEvent)>,
}

impl SocketHandlers {
    fn new(sink: TransportSink) -> Self {
        let on_open = sink.clone();
        let onopen = Closure::wrap(Box::new(move |_event: Event| {
            on_open(TransportEvent::Opened);
        }) as Box<dyn FnMut(Event)>);

        let on_message = sink.clone();
        let onmessage = Closure::wrap(Box::new(move |event: MessageEvent| {
            match frame_text(&event.data()) {
                Some(text) => on_message(TransportEvent::Text(text)),
                None => log::warn!("Ignoring non-text socket frame"),
            }
        }) as Box<dyn FnMut(MessageEvent)>);

        // Browsers say nothing useful in socket error events.
        let on_error = sink.clone();
        let onerror = Closure::wrap(Box::new(move |event: Event| {
            on_error(TransportEvent::Error(event.type_()));
        }) as Box<dyn FnMut(Event)>);

        let on_close = sink;
        let onclose = Closure::wrap(Box::new(move |event: CloseEvent| {
            on_close(TransportEvent::Closed {
                code: event.code(),
                was_clean: event.was_clean(),
            });
        }) as Box<dyn FnMut(CloseEvent)>);

        Self {
            onopen,
            onmessage,
            onerror,
            onclose,
        }
    }

    fn attach(&self, socket: &WebSocket) {
        socket.set_onopen(Some(self.onopen.as_ref().unchecked_ref()));
        socket.set_onmessage(Some(self.onmessage.as_ref().unchecked_ref()));
        socket.set_onerror(Some(self.onerror.as_ref().unchecked_ref()));
        socket.set_onclose(Some(self.onclose.as_ref().unchecked_ref()));
    }

    fn detach(socket: &WebSocket) {
        socket.set_onopen(None);
        socket.set_onmessage(None);
        socket.set_onerror(None);
        socket.set_onclose(None);
    }
}

/// One browser WebSocket
pub struct WebSocketTransport {
    socket: WebSocket,
    handlers: RefCell<Option<SocketHandlers>>,
}

impl WebSocketTransport {
    /// Unhook and free the handlers. The connection manager drops its
    /// transport from inside `onclose`, so the closures are freed on a
    /// later microtask, never while one of them is running.
    fn release_handlers(&self) {
        let Some(handlers) = self.handlers.borrow_mut().take() else {
            return;
        };
        SocketHandlers::detach(&self.socket);
        wasm_bindgen_futures::spawn_local(async move {
            drop(handlers);
        });
    }
}

impl Transport for WebSocketTransport {
    fn send_text(&self, text: &str) -> Result<()> {
        if self.socket.ready_state() != WebSocket::OPEN {
            return Err(ChatError::NotConnected);
        }
        self.socket
            .send_with_str(text)
            .map_err(|e| ChatError::Transport(format!("send failed: {:?}", e)))
    }

    /// Events of a closed transport are never delivered.
    fn close(&self) {
        match self.socket.ready_state() {
            WebSocket::CLOSING | WebSocket::CLOSED => {}
            _ => {
                if let Err(e) = self.socket.close() {
                    log::warn!("WebSocket close failed: {:?}", e);
                }
            }
        }
        self.release_handlers();
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn frame_text(data: &JsValue) -> Option<String> {
    if let Some(text) = data.as_string() {
        return Some(text);
    }
    let buffer = data.dyn_ref::<ArrayBuffer>()?;
    String::from_utf8(Uint8Array::new(buffer).to_vec()).ok()
}

/// Socket URLs carry the bearer token; keep it out of the console.
fn redact_token(url: &str) -> String {
    match url.find("token=") {
        Some(start) => {
            let value_start = start + "token=".len();
            let end = url[value_start..]
                .find('&')
                .map_or(url.len(), |offset| value_start + offset);
            format!("{}***{}", &url[..value_start], &url[end..])
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::redact_token;

    #[test]
    fn test_redact_token_last_param() {
        assert_eq!(
            redact_token("ws://h/ws/community?token=abc"),
            "ws://h/ws/community?token=***"
        );
    }

    #[test]
    fn test_redact_token_middle_param() {
        assert_eq!(
            redact_token("ws://h/ws/chat/5?token=abc&seller_id=9"),
            "ws://h/ws/chat/5?token=***&seller_id=9"
        );
    }

    #[test]
    fn test_redact_token_absent() {
        assert_eq!(redact_token("ws://h/ws/chat/5?seller_id=9"), "ws://h/ws/chat/5?seller_id=9");
    }
}
