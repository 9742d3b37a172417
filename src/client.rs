//! Minimal consumer of an event stream, used by `dx-pulse tail`.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{TimeZone, Utc};
use colored::*;
use reqwest::{header, Client, Response};
use url::Url;

use crate::envelope::ReceivedEvent;
use crate::stream::frame::{Frame, FrameDecoder};

/// An open event stream, yielding decoded frames.
pub struct EventStream {
    response: Response,
    decoder: FrameDecoder,
}

impl EventStream {
    /// Connect to `url`, presenting `token` as a bearer token if given
    pub async fn connect(url: &str, token: Option<&str>) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| anyhow!("invalid stream url: {e}"))?;

        let mut request = Client::new()
            .get(url.as_str())
            .header(header::ACCEPT, "text/event-stream");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("stream rejected by server: {status}");
        }

        Ok(Self {
            response,
            decoder: FrameDecoder::new(),
        })
    }

    /// Next frame, or `None` once the server closes the stream
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.decoder.next_frame() {
                return Ok(Some(frame));
            }
            match self.response.chunk().await? {
                Some(chunk) => self.decoder.push(&chunk),
                None => return Ok(None),
            }
        }
    }

    /// Next data frame decoded as an envelope, skipping comments
    pub async fn next_event(&mut self) -> Result<Option<ReceivedEvent>> {
        while let Some(frame) = self.next_frame().await? {
            if let Frame::Data(payload) = frame {
                return Ok(Some(ReceivedEvent::from_slice(&payload)?));
            }
        }
        Ok(None)
    }
}

/// Follow `url` and print every frame until the stream ends
pub async fn tail(url: &str, token: Option<&str>) -> Result<()> {
    let mut stream = EventStream::connect(url, token).await?;
    println!("{} Connected to {}", "✓".green(), url.bright_blue());

    while let Some(frame) = stream.next_frame().await? {
        match frame {
            Frame::Comment(text) => {
                println!("{}", format!(": {text}").bright_black());
            }
            Frame::Data(payload) => match ReceivedEvent::from_slice(&payload) {
                Ok(event) => print_event(&event),
                Err(_) => println!("{}", String::from_utf8_lossy(&payload)),
            },
        }
    }

    println!("{}", "Stream closed".yellow());
    Ok(())
}

fn print_event(event: &ReceivedEvent) {
    let time = Utc
        .timestamp_opt(event.time, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| event.time.to_string());

    println!(
        "{} {} {}",
        format!("[{time}]").bright_black(),
        event.event_type.bright_cyan().bold(),
        event.data
    );
}
