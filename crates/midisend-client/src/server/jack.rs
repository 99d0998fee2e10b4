//! JACK backend.
//!
//! The jack crate registers the process handler as part of activation, so a
//! failure there is reported against the activate stage.

use ::jack::{
    AsyncClient, Client, ClientOptions, Control, MidiOut, MidiWriter, ProcessHandler, ProcessScope,
    RawMidi,
};
use midisend_core::MidiMessage;
use tracing::{debug, warn};

use super::{AudioServer, BufferFull, ConnectOptions, PeriodBuffer, ServerConnection, Status};
use crate::callback::OutputProcessor;

/// Status used when jack reports an error without a status word.
const STATUS_OTHER: Status = -1;

fn status_of(error: &::jack::Error) -> Status {
    match error {
        ::jack::Error::ClientError(status) => status.bits() as Status,
        _ => STATUS_OTHER,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JackServer;

impl AudioServer for JackServer {
    type Connection = JackConnection;

    fn connect(&self, name: &str, options: ConnectOptions) -> Result<JackConnection, Status> {
        let flags = if options.no_start_server {
            ClientOptions::NO_START_SERVER
        } else {
            ClientOptions::empty()
        };

        let (client, status) = Client::new(name, flags).map_err(|e| {
            warn!(error = %e, "jack client open failed");
            status_of(&e)
        })?;
        debug!(client = client.name(), ?status, "jack client opened");

        Ok(JackConnection {
            name: client.name().to_string(),
            state: JackState::Inactive {
                client,
                handler: None,
            },
        })
    }
}

struct JackProcess {
    port: ::jack::Port<MidiOut>,
    processor: OutputProcessor,
}

impl ProcessHandler for JackProcess {
    fn process(&mut self, _: &Client, ps: &ProcessScope) -> Control {
        let mut buffer = JackBuffer {
            writer: self.port.writer(ps),
        };
        self.processor.process(ps.n_frames(), &mut buffer);
        Control::Continue
    }
}

struct JackBuffer<'a> {
    writer: MidiWriter<'a>,
}

impl PeriodBuffer for JackBuffer<'_> {
    // Obtaining the writer already cleared the port buffer.
    fn clear(&mut self) {}

    fn write(&mut self, frame: u32, message: &MidiMessage) -> Result<(), BufferFull> {
        self.writer
            .write(&RawMidi {
                time: frame,
                bytes: message.as_bytes(),
            })
            .map_err(|_| BufferFull)
    }

    fn max_event_size(&self) -> usize {
        self.writer.max_event_size()
    }
}

enum JackState {
    Inactive {
        client: Client,
        handler: Option<JackProcess>,
    },
    Active(AsyncClient<(), JackProcess>),
    Closed,
}

pub struct JackConnection {
    name: String,
    state: JackState,
}

impl JackConnection {
    fn release(&mut self) {
        self.deactivate();
        if let JackState::Inactive { client, handler } =
            std::mem::replace(&mut self.state, JackState::Closed)
        {
            if let Some(JackProcess { port, processor }) = handler {
                drop(processor);
                if let Err(e) = client.unregister_port(port) {
                    warn!(client = %self.name, error = %e, "jack port unregister failed");
                }
            }
            drop(client);
            debug!(client = %self.name, "jack client closed");
        }
    }
}

impl ServerConnection for JackConnection {
    type Port = ::jack::Port<MidiOut>;

    fn client_name(&self) -> &str {
        &self.name
    }

    fn register_output_port(&mut self, name: &str) -> Result<Self::Port, Status> {
        match &self.state {
            JackState::Inactive { client, .. } => client
                .register_port(name, MidiOut::default())
                .map_err(|e| status_of(&e)),
            _ => Err(STATUS_OTHER),
        }
    }

    fn register_process_callback(
        &mut self,
        port: Self::Port,
        processor: OutputProcessor,
    ) -> Result<(), Status> {
        match &mut self.state {
            JackState::Inactive { handler, .. } => {
                *handler = Some(JackProcess { port, processor });
                Ok(())
            }
            _ => Err(STATUS_OTHER),
        }
    }

    fn activate(&mut self) -> Result<(), Status> {
        match std::mem::replace(&mut self.state, JackState::Closed) {
            JackState::Inactive {
                client,
                handler: Some(handler),
            } => match client.activate_async((), handler) {
                Ok(active) => {
                    self.state = JackState::Active(active);
                    Ok(())
                }
                Err(e) => {
                    warn!(client = %self.name, error = %e, "jack activation failed");
                    Err(status_of(&e))
                }
            },
            other => {
                self.state = other;
                Err(STATUS_OTHER)
            }
        }
    }

    fn deactivate(&mut self) {
        match std::mem::replace(&mut self.state, JackState::Closed) {
            JackState::Active(active) => match active.deactivate() {
                Ok((client, (), handler)) => {
                    self.state = JackState::Inactive {
                        client,
                        handler: Some(handler),
                    };
                }
                Err(e) => warn!(client = %self.name, error = %e, "jack deactivation failed"),
            },
            other => self.state = other,
        }
    }

    fn disconnect(mut self) {
        self.release();
    }
}

impl Drop for JackConnection {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for JackConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            JackState::Inactive { .. } => "inactive",
            JackState::Active(_) => "active",
            JackState::Closed => "closed",
        };
        f.debug_struct("JackConnection")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}
