//! Device service: one task owns the device, callers talk to it over a channel
//!
//! Requests are processed strictly in arrival order, so the owning task is
//! the only place the device is ever touched. Each request carries a
//! `oneshot` sender for its reply.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

use crate::control::{ControlRequest, ControlResponse};
use crate::device::Device;
use crate::error::{DeviceError, Result};
use crate::idgen::SessionHandle;

/// Requests sent from `DeviceClient` to `DeviceService`
#[derive(Debug)]
pub enum DeviceRequest {
    Open {
        response: oneshot::Sender<Result<SessionHandle>>,
    },
    Read {
        session: SessionHandle,
        max_len: usize,
        response: oneshot::Sender<Result<Vec<u8>>>,
    },
    Write {
        data: Vec<u8>,
        response: oneshot::Sender<Result<usize>>,
    },
    Control {
        session: SessionHandle,
        request: ControlRequest,
        response: oneshot::Sender<Result<ControlResponse>>,
    },
    /// Raw command number plus argument bytes
    Ioctl {
        session: SessionHandle,
        cmd: u32,
        arg: Vec<u8>,
        response: oneshot::Sender<Result<Vec<u8>>>,
    },
    Close {
        session: SessionHandle,
        response: oneshot::Sender<Result<()>>,
    },
}

/// Owner of the device; run it on its own task
pub struct DeviceService {
    device: Device,
    request_rx: mpsc::UnboundedReceiver<DeviceRequest>,
    /// Dropped when `run()` starts so the loop ends with the last client
    request_tx: mpsc::UnboundedSender<DeviceRequest>,
}

impl DeviceService {
    #[must_use]
    pub fn new(device: Device) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        Self {
            device,
            request_rx,
            request_tx,
        }
    }

    /// A handle for submitting requests
    #[must_use]
    pub fn client(&self) -> DeviceClient {
        DeviceClient {
            request_tx: self.request_tx.clone(),
        }
    }

    /// Process requests until every client is dropped, then release the device
    pub async fn run(self) -> Device {
        let Self {
            device,
            mut request_rx,
            request_tx,
        } = self;
        drop(request_tx);
        info!(device = %device.name(), "device service started");

        while let Some(request) = request_rx.recv().await {
            Self::handle(&device, request);
        }

        debug!(device = %device.name(), "request channel closed");
        device
    }

    fn handle(device: &Device, request: DeviceRequest) {
        // A dropped receiver means the caller gave up; nothing to report to.
        match request {
            DeviceRequest::Open { response } => {
                let _ = response.send(device.open());
            }
            DeviceRequest::Read {
                session,
                max_len,
                response,
            } => {
                let _ = response.send(device.read(session, max_len));
            }
            DeviceRequest::Write { data, response } => {
                let _ = response.send(device.write(&data));
            }
            DeviceRequest::Control {
                session,
                request,
                response,
            } => {
                let _ = response.send(device.control(session, request));
            }
            DeviceRequest::Ioctl {
                session,
                cmd,
                arg,
                response,
            } => {
                let _ = response.send(device.ioctl(session, cmd, &arg));
            }
            DeviceRequest::Close { session, response } => {
                let _ = response.send(device.close(session));
            }
        }
        trace!("request processed");
    }
}

/// Cloneable handle to a running `DeviceService`
#[derive(Debug, Clone)]
pub struct DeviceClient {
    request_tx: mpsc::UnboundedSender<DeviceRequest>,
}

impl DeviceClient {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> DeviceRequest,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .send(make(tx))
            .map_err(|_| DeviceError::ServiceStopped)?;
        rx.await.map_err(|_| DeviceError::ServiceStopped)?
    }

    /// # Errors
    /// As [`Device::open`], or `ServiceStopped`.
    pub async fn open(&self) -> Result<SessionHandle> {
        self.call(|response| DeviceRequest::Open { response }).await
    }

    /// # Errors
    /// As [`Device::read`], or `ServiceStopped`.
    pub async fn read(&self, session: SessionHandle, max_len: usize) -> Result<Vec<u8>> {
        self.call(|response| DeviceRequest::Read {
            session,
            max_len,
            response,
        })
        .await
    }

    /// # Errors
    /// As [`Device::write`], or `ServiceStopped`.
    pub async fn write(&self, data: impl Into<Vec<u8>>) -> Result<usize> {
        let data = data.into();
        self.call(|response| DeviceRequest::Write { data, response })
            .await
    }

    /// # Errors
    /// As [`Device::control`], or `ServiceStopped`.
    pub async fn control(
        &self,
        session: SessionHandle,
        request: ControlRequest,
    ) -> Result<ControlResponse> {
        self.call(|response| DeviceRequest::Control {
            session,
            request,
            response,
        })
        .await
    }

    /// # Errors
    /// As [`Device::ioctl`], or `ServiceStopped`.
    pub async fn ioctl(&self, session: SessionHandle, cmd: u32, arg: &[u8]) -> Result<Vec<u8>> {
        let arg = arg.to_vec();
        self.call(|response| DeviceRequest::Ioctl {
            session,
            cmd,
            arg,
            response,
        })
        .await
    }

    /// # Errors
    /// As [`Device::close`], or `ServiceStopped`.
    pub async fn close(&self, session: SessionHandle) -> Result<()> {
        self.call(|response| DeviceRequest::Close { session, response })
            .await
    }
}
