//! writer.rs
//! Threaded writer contexts: one named thread per inbound channel, each running an
//! `InboundHandler` until its channel closes.

use crossbeam::channel::Receiver;
use log::info;
use std::{
    io,
    thread::{self, JoinHandle},
};

use crate::transport::{message::Envelope, receiver::InboundHandler};

pub fn spawn_writer(
    name: &str,
    handler: InboundHandler,
    rx: Receiver<Envelope>,
) -> io::Result<JoinHandle<()>> {
    let thread_name = format!("writer-{}", name);
    thread::Builder::new().name(thread_name.clone()).spawn(move || {
        handler.run(rx);
        info!("[{}] stopped.", thread_name);
    })
}
