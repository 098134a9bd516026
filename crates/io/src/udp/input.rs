//! UDP 소스
//!
//! 생성 시 `bind:port`에 소켓을 바인드하고(실패하면 생성 에러), 실행 중에는
//! 데이터그램 하나를 디코딩해 이벤트 하나로 전달합니다. 디코딩에 실패한 레코드는
//! 버립니다.
//!
//! 소스는 입력 채널이 없으므로 외부 수신 대기 중에도 정지 토큰을 함께 기다립니다.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Deserialize;
use tokio::net::UdpSocket;

use evpipe_core::codec::{CodecKind, LineCodec};
use evpipe_core::component::{BoxFuture, Component, ComponentBase, EventReceiver, EventSender};
use evpipe_core::config::{Options, parse_options, stats_every};
use evpipe_core::error::EvpipeError;
use evpipe_core::event::Event;
use evpipe_core::metrics as m;

use crate::error::IoAdapterError;

/// UDP 데이터그램 최대 크기
const MAX_DATAGRAM: usize = 65_535;

/// UDP 소스 옵션
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UdpSourceOptions {
    /// 바인드 주소
    pub bind: String,
    /// 바인드 포트 (0이면 임의 포트)
    pub port: u16,
    /// 수신 버퍼 크기 (바이트)
    pub max_datagram: usize,
}

impl Default for UdpSourceOptions {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_owned(),
            port: 0,
            max_datagram: MAX_DATAGRAM,
        }
    }
}

impl UdpSourceOptions {
    /// 옵션 값을 검증합니다.
    pub fn validate(&self, stage: &str) -> Result<(), IoAdapterError> {
        if self.max_datagram == 0 || self.max_datagram > MAX_DATAGRAM {
            return Err(IoAdapterError::Config {
                field: format!("{stage}.max_datagram"),
                reason: format!("must be 1-{MAX_DATAGRAM}"),
            });
        }
        if self.bind.trim().is_empty() {
            return Err(IoAdapterError::Config {
                field: format!("{stage}.bind"),
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

/// UDP 소스 (코덱은 생성 시 주입)
pub struct UdpInput {
    base: ComponentBase,
    codec: Box<dyn LineCodec>,
    socket: std::net::UdpSocket,
    max_datagram: usize,
}

impl UdpInput {
    /// 옵션을 검증하고 소켓을 바인드합니다.
    pub fn new(
        module: &str,
        tag: &str,
        kind: CodecKind,
        input: Option<EventReceiver>,
        output: Option<EventSender>,
        options: &Options,
    ) -> Result<Self, EvpipeError> {
        let source_options: UdpSourceOptions = parse_options(module, options)?;
        source_options.validate(module)?;
        let codec = kind.build(module, options)?;

        if input.is_some() {
            tracing::warn!(stage = tag, "UDP source ignores its input channel");
        }

        let addr = format!("{}:{}", source_options.bind, source_options.port);
        let bind_err = |e: std::io::Error| IoAdapterError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        };
        let socket = std::net::UdpSocket::bind(addr.as_str()).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;
        let local = socket.local_addr().map_err(bind_err)?;

        tracing::info!(stage = tag, %local, codec = codec.name(), "UDP source bound");
        Ok(Self {
            base: ComponentBase::new(tag, None, output).with_stats_every(stats_every(options)),
            codec,
            socket,
            max_datagram: source_options.max_datagram,
        })
    }

    /// 실제로 바인드된 주소
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    async fn process(&self, socket: &UdpSocket) -> Result<(), EvpipeError> {
        let tag = self.base.tag();
        let stop = self.base.stop_token();
        let mut buf = vec![0u8; self.max_datagram];

        while !self.base.should_stop() {
            let received = tokio::select! {
                _ = stop.cancelled() => break,
                r = socket.recv_from(&mut buf) => r,
            };

            let (len, peer) = match received {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(stage = tag, error = %e, "receive failed");
                    continue;
                }
            };

            let fields = match self.codec.decode(&buf[..len]) {
                Ok(fields) => fields,
                Err(e) => {
                    metrics::counter!(m::CODEC_ERRORS_TOTAL, m::LABEL_STAGE => tag.to_owned(), m::LABEL_CODEC => self.codec.name())
                        .increment(1);
                    tracing::debug!(stage = tag, %peer, error = %e, "dropping undecodable datagram");
                    continue;
                }
            };

            self.base.forward(Event::new(fields)).await?;
            self.base.stats_add_message();
            self.base.print_stats();
        }
        Ok(())
    }
}

impl Component for UdpInput {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn run(self: Arc<Self>) -> BoxFuture<'static, Result<(), EvpipeError>> {
        Box::pin(async move {
            let std_socket = self.socket.try_clone().map_err(IoAdapterError::from)?;
            let socket = UdpSocket::from_std(std_socket).map_err(IoAdapterError::from)?;
            tracing::debug!(stage = %self.tag(), "UDP source starting");

            let result = self.process(&socket).await;
            tracing::info!(stage = %self.tag(), received = self.base.messages(), "UDP source stopping");
            result
        })
    }
}

impl std::fmt::Debug for UdpInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpInput")
            .field("base", &self.base)
            .field("codec", &self.codec.name())
            .field("local_addr", &self.socket.local_addr().ok())
            .field("max_datagram", &self.max_datagram)
            .finish()
    }
}
