use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;

use crate::capture::domain::frame_source::{FrameSource, SourceError, SourceFrame, SourceInfo};
use crate::shared::frame::Frame;

const DECODER_THREADS: usize = 4;

/// Demuxer options tuned for low-latency camera streams.
const LOW_LATENCY_OPTIONS: &[(&str, &str)] = &[
    ("rtsp_transport", "tcp"),
    ("buffer_size", "32768"),
    ("max_delay", "500000"),
];

/// Decodes a live stream (typically RTSP) via ffmpeg-next into RGB24 frames.
///
/// Each frame carries the stream PTS converted to nanoseconds through the
/// stream time base, when the decoder provides one.
pub struct FfmpegRtspSource {
    uri: String,
    stream: Option<OpenStream>,
}

struct OpenStream {
    input: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    video_stream_index: usize,
    time_base: f64,
    width: u32,
    height: u32,
    frame_index: u64,
}

// Safety: the source is moved into the ingestion thread and only touched
// there. The raw pointers inside ffmpeg types are never shared.
unsafe impl Send for FfmpegRtspSource {}

impl FfmpegRtspSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            stream: None,
        }
    }

    fn connect(&self) -> Result<OpenStream, SourceError> {
        ffmpeg_next::init().map_err(|e| SourceError::connection(&self.uri, e))?;

        let mut options = ffmpeg_next::Dictionary::new();
        for (key, value) in LOW_LATENCY_OPTIONS {
            options.set(key, value);
        }

        let input = ffmpeg_next::format::input_with_dictionary(&self.uri, options)
            .map_err(|e| SourceError::connection(&self.uri, e))?;

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| SourceError::connection(&self.uri, "no video stream found"))?;
        let video_stream_index = stream.index();
        let time_base = f64::from(stream.time_base());

        let mut codec_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                .map_err(|e| SourceError::DecoderSetup(e.to_string()))?;
        codec_ctx.set_threading(ffmpeg_next::codec::threading::Config::count(DECODER_THREADS));
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| SourceError::DecoderSetup(e.to_string()))?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::FAST_BILINEAR,
        )
        .map_err(|e| SourceError::DecoderSetup(e.to_string()))?;

        Ok(OpenStream {
            input,
            decoder,
            scaler,
            video_stream_index,
            time_base,
            width,
            height,
            frame_index: 0,
        })
    }
}

impl FrameSource for FfmpegRtspSource {
    fn open(&mut self) -> Result<SourceInfo, SourceError> {
        let stream = self.connect()?;
        let info = SourceInfo {
            width: stream.width,
            height: stream.height,
            codec: stream
                .decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            description: self.uri.clone(),
        };
        self.stream = Some(stream);
        Ok(info)
    }

    fn next_frame(&mut self) -> Result<SourceFrame, SourceError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(SourceError::connection(&self.uri, "source not opened"));
        };
        stream.next_frame()
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

impl OpenStream {
    fn next_frame(&mut self) -> Result<SourceFrame, SourceError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return self.convert(&decoded),
                Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {}
                Err(ffmpeg_next::Error::Eof) => return Err(SourceError::EndOfStream),
                Err(e) => return Err(SourceError::Decode(e.to_string())),
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => return Err(SourceError::EndOfStream),
                Err(e) => return Err(SourceError::Read(e.to_string())),
            }
            if packet.stream() != self.video_stream_index {
                continue;
            }
            // A rejected packet is skipped; the decoder resyncs on the next keyframe.
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Decoder rejected packet: {e}");
            }
        }
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg_next::util::frame::video::Video,
    ) -> Result<SourceFrame, SourceError> {
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(decoded, &mut rgb)
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;

        let native_time_ns = decoded
            .pts()
            .filter(|&pts| pts >= 0)
            .map(|pts| (pts as f64 * self.time_base * 1e9) as u64);

        Ok(SourceFrame {
            frame,
            native_time_ns,
        })
    }
}

/// Copies the first plane of an RGB24 frame into a tightly packed buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
