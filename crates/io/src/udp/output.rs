//! UDP 싱크
//!
//! 실행 시 `target:port`로 연결된 UDP 소켓을 열고, 이벤트마다 인코딩 결과를
//! 데이터그램 하나로 보냅니다. 출력 채널이 연결되어 있으면 이벤트를 계속 전달하므로
//! 복제(replication) 스테이지로도 쓸 수 있습니다.
//!
//! 연결 실패는 스테이지 에러이고, 데이터그램별 전송 실패는 로그만 남깁니다.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use serde::Deserialize;
use tokio::net::UdpSocket;

use evpipe_core::codec::{CodecKind, LineCodec};
use evpipe_core::component::{BoxFuture, Component, ComponentBase, EventReceiver, EventSender};
use evpipe_core::config::{Options, parse_options, stats_every};
use evpipe_core::error::EvpipeError;
use evpipe_core::metrics as m;

use crate::error::IoAdapterError;

/// UDP 싱크 옵션
#[derive(Debug, Clone, Deserialize)]
pub struct UdpSinkOptions {
    /// 대상 호스트
    pub target: Option<String>,
    /// 대상 포트
    pub port: Option<u16>,
}

impl UdpSinkOptions {
    /// 옵션을 검증하고 `(호스트, 포트)`를 돌려줍니다.
    pub fn validate(&self, stage: &str) -> Result<(String, u16), IoAdapterError> {
        let target = match self.target.as_deref() {
            Some(t) if !t.trim().is_empty() => t.trim().to_owned(),
            _ => {
                return Err(IoAdapterError::Config {
                    field: format!("{stage}.target"),
                    reason: "a target host is required".to_owned(),
                });
            }
        };
        let port = match self.port {
            Some(p) if p > 0 => p,
            _ => {
                return Err(IoAdapterError::Config {
                    field: format!("{stage}.port"),
                    reason: "a port between 1 and 65535 is required".to_owned(),
                });
            }
        };
        Ok((target, port))
    }
}

/// UDP 싱크 (코덱은 생성 시 주입)
pub struct UdpOutput {
    base: ComponentBase,
    codec: Box<dyn LineCodec>,
    target: String,
    port: u16,
}

impl UdpOutput {
    /// 옵션을 검증하고 지정한 코덱으로 싱크를 생성합니다.
    pub fn new(
        module: &str,
        tag: &str,
        kind: CodecKind,
        input: Option<EventReceiver>,
        output: Option<EventSender>,
        options: &Options,
    ) -> Result<Self, EvpipeError> {
        let sink_options: UdpSinkOptions = parse_options(module, options)?;
        let (target, port) = sink_options.validate(module)?;
        let codec = kind.build(module, options)?;

        if input.is_none() {
            return Err(IoAdapterError::Config {
                field: module.to_owned(),
                reason: "requires an input channel (cannot be the first stage)".to_owned(),
            }
            .into());
        }

        tracing::info!(stage = tag, %target, port, codec = codec.name(), "creating UDP sink");
        Ok(Self {
            base: ComponentBase::new(tag, input, output).with_stats_every(stats_every(options)),
            codec,
            target,
            port,
        })
    }

    async fn connect(&self) -> Result<UdpSocket, IoAdapterError> {
        let addr = format!("{}:{}", self.target, self.port);
        let connect_err = |reason: String| IoAdapterError::Connect {
            addr: addr.clone(),
            reason,
        };

        let remote: SocketAddr = tokio::net::lookup_host((self.target.as_str(), self.port))
            .await
            .map_err(|e| connect_err(e.to_string()))?
            .next()
            .ok_or_else(|| connect_err("no address resolved".to_owned()))?;

        let local: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        socket
            .connect(remote)
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        tracing::info!(stage = %self.tag(), %remote, "UDP sink connected");
        Ok(socket)
    }

    async fn process(&self, socket: &UdpSocket) -> Result<(), EvpipeError> {
        let tag = self.base.tag();
        while !self.base.should_stop() {
            let Some(event) = self.base.next_event().await else {
                break;
            };

            match self.codec.encode(&event.data) {
                Ok(datagram) => match socket.send(&datagram).await {
                    Ok(_) => {
                        metrics::counter!(m::SINK_RECORDS_TOTAL, m::LABEL_STAGE => tag.to_owned())
                            .increment(1);
                    }
                    Err(e) => tracing::warn!(stage = tag, error = %e, "failed to send datagram"),
                },
                Err(e) => {
                    metrics::counter!(m::CODEC_ERRORS_TOTAL, m::LABEL_STAGE => tag.to_owned(), m::LABEL_CODEC => self.codec.name())
                        .increment(1);
                    tracing::error!(stage = tag, error = %e, "failed to encode record");
                }
            }

            self.base.forward(event).await?;
            self.base.stats_add_message();
            self.base.print_stats();
        }
        Ok(())
    }
}

impl Component for UdpOutput {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn run(self: Arc<Self>) -> BoxFuture<'static, Result<(), EvpipeError>> {
        Box::pin(async move {
            let socket = self.connect().await?;
            let result = self.process(&socket).await;
            tracing::info!(stage = %self.tag(), sent = self.base.messages(), "UDP sink stopping");
            result
        })
    }
}

impl std::fmt::Debug for UdpOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpOutput")
            .field("base", &self.base)
            .field("codec", &self.codec.name())
            .field("target", &self.target)
            .field("port", &self.port)
            .finish()
    }
}
