use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::io::{self, AsyncRead, AsyncWrite, BufWriter, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use url::Url;

use crate::amf::{Amf0Value, AmfObject};
use crate::av::{Packet, PacketReader, PacketWriter};
use crate::bridge::{PacketToTag, TagToPacket};
use crate::chunk::{ChunkReader, ChunkWriter};
use crate::connection::stage::{Prepare, Stage};
use crate::connection::url::{create_url, split_path, tc_url};
use crate::flv::tag::{self as flvtag, Tag};
use crate::handshake::{handshake_client, handshake_server};
use crate::protocol::{
    encode_command, msg_type_name, split_aggregate, Command, RtmpMessage, CHUNK_STREAM_AUDIO,
    CHUNK_STREAM_COMMAND, CHUNK_STREAM_PROTOCOL, CHUNK_STREAM_STATUS, CHUNK_STREAM_VIDEO,
    CONNECT_CHUNK_SIZE, DEFAULT_WINDOW_ACK_SIZE, EVENT_PING_REQUEST, EVENT_PING_RESPONSE,
    EVENT_SET_BUFFER_LENGTH, EVENT_STREAM_BEGIN, EVENT_STREAM_IS_RECORDED, MSG_TYPE_ACK,
    MSG_TYPE_AUDIO, MSG_TYPE_DATA_AMF0, MSG_TYPE_DATA_AMF3, MSG_TYPE_SET_CHUNK_SIZE,
    MSG_TYPE_SET_PEER_BW, MSG_TYPE_USER_CONTROL, MSG_TYPE_VIDEO, MSG_TYPE_WINDOW_ACK,
};
use crate::{ByteBuffer, Error, Result};

const FMS_VERSION: &str = "LNX 9,0,124,2";

const CODE_CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";
const CODE_PLAY_RESET: &str = "NetStream.Play.Reset";
const CODE_PLAY_START: &str = "NetStream.Play.Start";
const CODE_PLAY_FAILED: &str = "NetStream.Play.Failed";
const CODE_PLAY_PUBLISH_NOTIFY: &str = "NetStream.Play.PublishNotify";
const CODE_DATA_START: &str = "NetStream.Data.Start";
const CODE_PUBLISH_START: &str = "NetStream.Publish.Start";
const CODE_PUBLISH_FAILED: &str = "NetStream.Publish.Failed";

fn status_obj(code: &str, description: &str) -> AmfObject {
    AmfObject::new()
        .with("level", "status")
        .with("code", code)
        .with("description", description)
}

/// One RTMP connection: the chunk reader/writer pair, the stage machine,
/// and the command dialogue for either polarity. A connection is driven by
/// `prepare()` up to the requested stage, then by `read_tag`/`write_tag`
/// (or the packet surface) in the data phase.
pub struct Conn<S> {
    rd: Option<ChunkReader<ReadHalf<S>>>,
    wr: ChunkWriter<BufWriter<WriteHalf<S>>>,

    pub stage: Stage,
    is_server: bool,
    pub publishing: bool,

    /// Full stream URL, set by connect+publish/play (server) or dial
    /// (client)
    pub url: Option<Url>,
    pub tc_url: String,
    pub page_url: String,
    pub flash_ver: String,
    object_encoding: f64,

    /// Set before the GotPublishOrPlay stage is advanced to reject the
    /// peer with Publish.Failed / Play.Failed instead of accepting
    pub pub_play_err: Option<String>,

    /// Message stream id assigned by createStream, used for all A/V
    av_stream_id: u32,
    last_transaction_id: f64,

    /// Window the peer asked us to acknowledge at
    read_ack_window: u32,
    last_ack: u32,

    /// Pending messages expanded from an aggregate message
    agg_queue: VecDeque<RtmpMessage>,

    /// Emit the |RtmpSampleAccess notice on play accept
    pub sample_access: bool,
    /// Chunk size announced during connect
    pub connect_chunk_size: usize,
    /// WindowAckSize/SetPeerBandwidth value announced during connect
    pub window_ack_size: u32,

    tag_to_packet: TagToPacket,
    packet_to_tag: PacketToTag,

    close_tx: mpsc::Sender<()>,
    close_rx: Option<mpsc::Receiver<()>>,
}

impl<S> Conn<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn new(stream: S, is_server: bool, buffer_size: usize) -> Self {
        let (rd, wr) = io::split(stream);
        let (close_tx, close_rx) = mpsc::channel(1);
        Conn {
            rd: Some(ChunkReader::new(rd)),
            wr: ChunkWriter::new(BufWriter::with_capacity(buffer_size, wr)),
            stage: Stage::Init,
            is_server,
            publishing: false,
            url: None,
            tc_url: String::new(),
            page_url: String::new(),
            flash_ver: String::new(),
            object_encoding: 0.0,
            pub_play_err: None,
            av_stream_id: 0,
            last_transaction_id: 0.0,
            read_ack_window: DEFAULT_WINDOW_ACK_SIZE,
            last_ack: 0,
            agg_queue: VecDeque::new(),
            sample_access: false,
            connect_chunk_size: CONNECT_CHUNK_SIZE,
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            tag_to_packet: TagToPacket::new(),
            packet_to_tag: PacketToTag::new(),
            close_tx,
            close_rx: Some(close_rx),
        }
    }

    /// Accepted server-side connection
    pub fn new_server(stream: S) -> Self {
        Conn::new(stream, true, 4096)
    }

    pub fn new_server_with_buffer(stream: S, buffer_size: usize) -> Self {
        Conn::new(stream, true, buffer_size)
    }

    /// Dialed client-side connection for the given stream URL
    pub fn new_client(stream: S, url: Url) -> Self {
        let mut conn = Conn::new(stream, false, 4096);
        conn.url = Some(url);
        conn
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    /// Stream path including any query, the pub/sub relay key
    pub fn stream_path(&self) -> String {
        match &self.url {
            Some(u) => {
                let mut p = u.path().to_string();
                if let Some(q) = u.query() {
                    p.push('?');
                    p.push_str(q);
                }
                p
            }
            None => String::new(),
        }
    }

    /// Channel signalled when the drained read half reaches EOF; take it
    /// once to observe peer disconnects while writing
    pub fn take_close_notify(&mut self) -> Option<mpsc::Receiver<()>> {
        self.close_rx.take()
    }

    fn writing(&self) -> bool {
        if self.is_server {
            !self.publishing
        } else {
            self.publishing
        }
    }

    fn reader(&mut self) -> Result<&mut ChunkReader<ReadHalf<S>>> {
        self.rd
            .as_mut()
            .ok_or_else(|| Error::invalid_state("read half already detached"))
    }

    // ---- stage machine ----

    /// Advance the connection through its stages until `target`
    pub async fn prepare(&mut self, target: Stage, dir: Prepare) -> Result<()> {
        while self.stage < target {
            match self.stage {
                Stage::Init => {
                    let is_server = self.is_server;
                    let rd = self
                        .rd
                        .as_mut()
                        .ok_or_else(|| Error::invalid_state("read half already detached"))?;
                    if is_server {
                        handshake_server(rd.inner_mut(), self.wr.inner_mut()).await?;
                    } else {
                        handshake_client(rd.inner_mut(), self.wr.inner_mut()).await?;
                    }
                    self.stage = Stage::HandshakeDone;
                    debug!("handshake done (server={})", is_server);
                }

                Stage::HandshakeDone => {
                    if self.is_server {
                        self.read_connect().await?;
                    } else if dir == Prepare::Reading {
                        self.connect_play().await?;
                    } else {
                        self.connect_publish().await?;
                    }
                }

                Stage::GotPublishOrPlay => {
                    let err = self.pub_play_err.clone();
                    match err {
                        None => self.write_pub_play_result(true, "").await?,
                        Some(msg) => self.write_pub_play_result(false, &msg).await?,
                    }
                    self.start_drain();
                }

                Stage::CommandDone => {
                    self.write_data_start().await?;
                }

                Stage::DataStart => break,
            }
        }
        Ok(())
    }

    /// `prepare` under a deadline; the handshake+command phase gets 15
    /// seconds by default
    pub async fn prepare_timed(
        &mut self,
        target: Stage,
        dir: Prepare,
        deadline: Duration,
    ) -> Result<()> {
        match tokio::time::timeout(deadline, self.prepare(target, dir)).await {
            Ok(res) => res,
            Err(_) => Err(Error::timeout(format!(
                "connection setup exceeded {:?}",
                deadline
            ))),
        }
    }

    /// On teardown after a rejection, make sure the failure status was
    /// written before the socket closes
    pub async fn write_pub_play_err_before_close(&mut self) {
        if self.pub_play_err.is_none() || self.stage < Stage::GotPublishOrPlay {
            return;
        }
        if let Err(e) = self.prepare(Stage::CommandDone, Prepare::Writing).await {
            debug!("failed to deliver rejection status: {}", e);
        }
    }

    /// Writers spawn a task that drains the unused read half so peer
    /// disconnects surface promptly on the close-notify channel
    fn start_drain(&mut self) {
        if !self.writing() || self.rd.is_none() {
            return;
        }
        let rd = self.rd.take().expect("reader present");
        let tx = self.close_tx.clone();
        tokio::spawn(async move {
            let mut inner = rd.into_inner();
            let _ = io::copy(&mut inner, &mut io::sink()).await;
            let _ = tx.send(()).await;
        });
    }

    // ---- server dialogue ----

    async fn read_connect(&mut self) -> Result<()> {
        let cmd = self.read_command().await?;
        if cmd.name != "connect" {
            return Err(Error::command(format!(
                "first command is {:?}, not connect",
                cmd.name
            )));
        }
        let obj = cmd
            .object
            .as_ref()
            .ok_or_else(|| Error::command("connect carries no command object"))?;

        let app = obj
            .get_string("app")
            .ok_or_else(|| Error::command("connect object has no app"))?
            .to_string();
        self.tc_url = obj.get_string_fold("tcUrl").unwrap_or_default().to_string();
        self.page_url = obj.get_string_fold("pageUrl").unwrap_or_default().to_string();
        self.flash_ver = obj.get_string_fold("flashVer").unwrap_or_default().to_string();
        self.object_encoding = obj.get_number("objectEncoding").unwrap_or(0.0);

        self.write_basic_conf().await?;

        let props = AmfObject::new()
            .with("fmsVer", FMS_VERSION)
            .with("capabilities", 31.0);
        let info = status_obj(CODE_CONNECT_SUCCESS, "Connection succeeded.")
            .with("objectEncoding", self.object_encoding);
        self.write_command(
            CHUNK_STREAM_COMMAND,
            0,
            "_result",
            cmd.transaction_id,
            Some(&props),
            &[Amf0Value::Object(info)],
        )
        .await?;
        self.flush().await?;

        loop {
            let cmd = self.read_command().await?;
            match cmd.name.as_str() {
                "createStream" => {
                    self.av_stream_id = 1;
                    self.write_command(
                        CHUNK_STREAM_COMMAND,
                        0,
                        "_result",
                        cmd.transaction_id,
                        None,
                        &[Amf0Value::Number(self.av_stream_id as f64)],
                    )
                    .await?;
                    self.flush().await?;
                }

                "publish" => {
                    let key = cmd
                        .param_string(0)
                        .ok_or_else(|| Error::command("publish carries no stream key"))?
                        .to_string();
                    self.url = Some(create_url(&self.tc_url, &app, &key)?);
                    self.publishing = true;
                    self.stage = Stage::GotPublishOrPlay;
                    info!("publish requested for {}", self.stream_path());
                    return Ok(());
                }

                "play" => {
                    let key = cmd
                        .param_string(0)
                        .ok_or_else(|| Error::command("play carries no stream key"))?
                        .to_string();
                    self.url = Some(create_url(&self.tc_url, &app, &key)?);
                    self.publishing = false;
                    self.stage = Stage::GotPublishOrPlay;
                    info!("play requested for {}", self.stream_path());
                    return Ok(());
                }

                other => {
                    debug!("ignoring command {:?} before publish/play", other);
                }
            }
        }
    }

    async fn write_pub_play_result(&mut self, ok: bool, msg: &str) -> Result<()> {
        let transid = self.last_transaction_id;
        if !self.publishing {
            if !ok {
                self.write_status(transid, status_obj(CODE_PLAY_FAILED, msg)).await?;
            } else {
                self.write_stream_is_recorded(self.av_stream_id).await?;
                self.write_stream_begin(self.av_stream_id).await?;
                self.write_status(transid, status_obj(CODE_PLAY_RESET, "play reset")).await?;
                self.write_status(transid, status_obj(CODE_PLAY_START, "play start")).await?;
                if self.sample_access {
                    let values = [
                        Amf0Value::String("|RtmpSampleAccess".to_string()),
                        Amf0Value::Boolean(true),
                        Amf0Value::Boolean(true),
                    ];
                    let data = crate::amf::encode_amf0_values(values.iter())?;
                    self.wr
                        .write_message(
                            CHUNK_STREAM_AUDIO,
                            MSG_TYPE_DATA_AMF0,
                            self.av_stream_id,
                            0,
                            &[],
                            &data,
                        )
                        .await?;
                }
                self.write_status(transid, status_obj(CODE_DATA_START, "data start")).await?;
            }
        } else if !ok {
            self.write_status(transid, status_obj(CODE_PUBLISH_FAILED, msg)).await?;
        } else {
            self.write_status(transid, status_obj(CODE_PUBLISH_START, "publish start")).await?;
        }

        self.flush().await?;
        self.stage = Stage::CommandDone;
        Ok(())
    }

    async fn write_data_start(&mut self) -> Result<()> {
        if self.writing() && !self.publishing {
            let transid = self.last_transaction_id;
            self.write_status(
                transid,
                status_obj(CODE_PLAY_PUBLISH_NOTIFY, "publish notify"),
            )
            .await?;
        }
        self.flush().await?;
        self.packet_to_tag.set_data_frame = !self.is_server && self.publishing;
        self.stage = Stage::DataStart;
        Ok(())
    }

    async fn write_status(&mut self, transid: f64, info: AmfObject) -> Result<()> {
        self.write_command(
            CHUNK_STREAM_STATUS,
            self.av_stream_id,
            "onStatus",
            transid,
            None,
            &[Amf0Value::Object(info)],
        )
        .await
    }

    // ---- client dialogue ----

    async fn write_connect(&mut self, app: &str) -> Result<()> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| Error::invalid_state("client connection has no URL"))?;

        self.write_basic_conf().await?;

        let obj = AmfObject::new()
            .with("app", app)
            .with("flashVer", FMS_VERSION)
            .with("tcUrl", tc_url(&url))
            .with("fpad", false)
            .with("capabilities", 15.0)
            .with("audioCodecs", 4071.0)
            .with("videoCodecs", 252.0)
            .with("videoFunction", 1.0);
        self.write_command(CHUNK_STREAM_COMMAND, 0, "connect", 1.0, Some(&obj), &[])
            .await?;
        self.flush().await?;

        loop {
            let cmd = self.read_command().await?;
            if cmd.name == "_result" {
                check_level_status(&cmd)
                    .map_err(|e| Error::command(format!("connect refused: {}", e)))?;
                return Ok(());
            }
        }
    }

    async fn connect_publish(&mut self) -> Result<()> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| Error::invalid_state("client connection has no URL"))?;
        let (app, key) = split_path(&url);

        self.write_connect(&app).await?;

        let mut transid = 1.0;

        transid += 1.0;
        self.write_command(
            CHUNK_STREAM_COMMAND,
            0,
            "releaseStream",
            transid,
            None,
            &[Amf0Value::String(key.clone())],
        )
        .await?;

        transid += 1.0;
        self.write_command(
            CHUNK_STREAM_COMMAND,
            0,
            "FCPublish",
            transid,
            None,
            &[Amf0Value::String(key.clone())],
        )
        .await?;

        transid += 1.0;
        let create_stream_transid = transid;
        self.write_command(CHUNK_STREAM_COMMAND, 0, "createStream", transid, None, &[])
            .await?;
        self.flush().await?;

        loop {
            let cmd = self.read_command().await?;
            if cmd.name == "_result" && cmd.transaction_id == create_stream_transid {
                self.av_stream_id = cmd
                    .param_number(0)
                    .ok_or_else(|| Error::command("createStream reply has no stream id"))?
                    as u32;
                break;
            }
        }

        transid += 1.0;
        self.write_command(
            CHUNK_STREAM_AUDIO,
            self.av_stream_id,
            "publish",
            transid,
            None,
            &[Amf0Value::String(key), Amf0Value::String(app)],
        )
        .await?;
        self.flush().await?;

        loop {
            let cmd = self.read_command().await?;
            if cmd.name == "onStatus" {
                check_level_status(&cmd)
                    .map_err(|e| Error::command(format!("publish refused: {}", e)))?;
                break;
            }
        }

        self.publishing = true;
        self.stage = Stage::CommandDone;
        info!("publishing to {}", self.stream_path());
        Ok(())
    }

    async fn connect_play(&mut self) -> Result<()> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| Error::invalid_state("client connection has no URL"))?;
        let (app, key) = split_path(&url);

        self.write_connect(&app).await?;

        self.write_command(CHUNK_STREAM_COMMAND, 0, "createStream", 2.0, None, &[])
            .await?;
        self.write_set_buffer_length(0, 100).await?;
        self.flush().await?;

        loop {
            let cmd = self.read_command().await?;
            if cmd.name == "_result" {
                self.av_stream_id = cmd
                    .param_number(0)
                    .ok_or_else(|| Error::command("createStream reply has no stream id"))?
                    as u32;
                break;
            }
        }

        self.write_command(
            CHUNK_STREAM_AUDIO,
            self.av_stream_id,
            "play",
            0.0,
            None,
            &[Amf0Value::String(key)],
        )
        .await?;
        self.flush().await?;

        loop {
            let cmd = self.read_command().await?;
            if cmd.name == "onStatus" {
                check_level_status(&cmd)
                    .map_err(|e| Error::command(format!("play refused: {}", e)))?;
                break;
            }
        }

        self.publishing = false;
        self.stage = Stage::CommandDone;
        info!("playing {}", self.stream_path());
        Ok(())
    }

    // ---- message plumbing ----

    async fn write_basic_conf(&mut self) -> Result<()> {
        let window = self.window_ack_size;
        self.write_window_ack_size(window).await?;
        self.write_set_peer_bandwidth(window, 2).await?;
        let size = self.connect_chunk_size;
        self.set_and_write_chunk_size(size).await?;
        Ok(())
    }

    /// Read one reassembled message, expanding aggregates and keeping the
    /// ack window satisfied
    pub async fn read_message(&mut self) -> Result<RtmpMessage> {
        loop {
            if let Some(msg) = self.agg_queue.pop_front() {
                return Ok(msg);
            }
            let chunk = self.reader()?.read_chunk().await?;
            self.maybe_send_ack().await?;
            if let Some(msg) = chunk {
                if msg.is_aggregate() {
                    self.agg_queue.extend(split_aggregate(&msg)?);
                    continue;
                }
                return Ok(msg);
            }
        }
    }

    /// Read messages, absorbing protocol control traffic
    async fn read_message_handle_event(&mut self) -> Result<RtmpMessage> {
        loop {
            let msg = self.read_message().await?;
            if self.handle_event(&msg).await? {
                self.flush().await?;
                continue;
            }
            return Ok(msg);
        }
    }

    /// Read until a command message arrives
    pub async fn read_command(&mut self) -> Result<Command> {
        loop {
            let msg = self.read_message_handle_event().await?;
            if let Some(cmd) = Command::from_message(&msg)? {
                self.last_transaction_id = cmd.transaction_id;
                debug!("command {:?} transid={}", cmd.name, cmd.transaction_id);
                return Ok(cmd);
            }
        }
    }

    /// Read until a media or script tag arrives
    pub async fn read_tag(&mut self) -> Result<Tag> {
        loop {
            let msg = self.read_message_handle_event().await?;
            match msg.type_id {
                MSG_TYPE_VIDEO | MSG_TYPE_AUDIO => {
                    let mut tag = Tag {
                        tag_type: msg.type_id,
                        time: msg.timestamp,
                        stream_id: msg.stream_id,
                        ..Tag::default()
                    };
                    match tag.parse_body(msg.data.clone()) {
                        Ok(()) => return Ok(tag),
                        Err(e) => {
                            warn!("skipping unparsable media payload: {}", e);
                        }
                    }
                }
                MSG_TYPE_DATA_AMF0 | MSG_TYPE_DATA_AMF3 => {
                    return Ok(Tag {
                        tag_type: msg.type_id,
                        time: msg.timestamp,
                        stream_id: msg.stream_id,
                        data: msg.data.clone(),
                        ..Tag::default()
                    });
                }
                other => {
                    debug!("skipping message {} in data phase", msg_type_name(other));
                }
            }
        }
    }

    /// Write a media or script tag (no flush; media writes aggregate)
    pub async fn write_tag(&mut self, tag: &Tag) -> Result<()> {
        let csid = match tag.tag_type {
            flvtag::TAG_AUDIO | flvtag::TAG_AMF0 | flvtag::TAG_AMF3 => CHUNK_STREAM_AUDIO,
            flvtag::TAG_VIDEO => CHUNK_STREAM_VIDEO,
            _ => CHUNK_STREAM_STATUS,
        };
        let prefix = tag.fill_sub_header();
        self.wr
            .write_message(
                csid,
                tag.tag_type,
                self.av_stream_id,
                tag.time,
                &prefix,
                &tag.data,
            )
            .await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.wr.flush().await
    }

    /// React to protocol control messages; returns whether the message
    /// was absorbed
    async fn handle_event(&mut self, msg: &RtmpMessage) -> Result<bool> {
        match msg.type_id {
            MSG_TYPE_SET_CHUNK_SIZE => {
                let mut buf = ByteBuffer::new(msg.data.to_vec());
                let size = buf.read_u32_be()?;
                if size == 0 || size > i32::MAX as u32 {
                    return Err(Error::protocol(format!("invalid chunk size {}", size)));
                }
                debug!("peer set chunk size to {}", size);
                self.reader()?.set_max_chunk_size(size as usize);
                Ok(true)
            }

            MSG_TYPE_WINDOW_ACK => {
                let mut buf = ByteBuffer::new(msg.data.to_vec());
                self.read_ack_window = buf.read_u32_be()?;
                Ok(true)
            }

            MSG_TYPE_USER_CONTROL => {
                let mut buf = ByteBuffer::new(msg.data.to_vec());
                let event = buf.read_u16_be()?;
                if event == EVENT_PING_REQUEST {
                    let ts = buf.read_u32_be()?;
                    self.write_ping_response(ts).await?;
                    return Ok(true);
                }
                Ok(false)
            }

            // acknowledgements and bandwidth hints need no reaction
            MSG_TYPE_ACK | MSG_TYPE_SET_PEER_BW => Ok(false),

            _ => Ok(false),
        }
    }

    async fn maybe_send_ack(&mut self) -> Result<()> {
        if self.read_ack_window == 0 {
            return Ok(());
        }
        let read = match &self.rd {
            Some(rd) => rd.bytes_read(),
            None => return Ok(()),
        };
        if read.wrapping_sub(self.last_ack) > self.read_ack_window {
            self.write_ack(read).await?;
            self.flush().await?;
            self.last_ack = read;
        }
        Ok(())
    }

    // ---- control message writers ----

    async fn write_event(&mut self, type_id: u8, payload: &[u8]) -> Result<()> {
        self.wr
            .write_message(CHUNK_STREAM_PROTOCOL, type_id, 0, 0, &[], payload)
            .await
    }

    pub async fn write_ack(&mut self, seq: u32) -> Result<()> {
        self.write_event(MSG_TYPE_ACK, &seq.to_be_bytes()).await
    }

    pub async fn write_window_ack_size(&mut self, size: u32) -> Result<()> {
        self.write_event(MSG_TYPE_WINDOW_ACK, &size.to_be_bytes()).await
    }

    pub async fn write_set_peer_bandwidth(&mut self, size: u32, limit_type: u8) -> Result<()> {
        let mut b = size.to_be_bytes().to_vec();
        b.push(limit_type);
        self.write_event(MSG_TYPE_SET_PEER_BW, &b).await
    }

    /// Announce and apply a new outgoing chunk size
    pub async fn set_and_write_chunk_size(&mut self, size: usize) -> Result<()> {
        self.write_event(MSG_TYPE_SET_CHUNK_SIZE, &(size as u32).to_be_bytes())
            .await?;
        self.wr.set_max_chunk_size(size);
        Ok(())
    }

    async fn write_user_control(&mut self, event: u16, rest: &[u8]) -> Result<()> {
        let mut b = event.to_be_bytes().to_vec();
        b.extend_from_slice(rest);
        self.write_event(MSG_TYPE_USER_CONTROL, &b).await
    }

    pub async fn write_stream_begin(&mut self, stream_id: u32) -> Result<()> {
        self.write_user_control(EVENT_STREAM_BEGIN, &stream_id.to_be_bytes())
            .await
    }

    pub async fn write_stream_is_recorded(&mut self, stream_id: u32) -> Result<()> {
        self.write_user_control(EVENT_STREAM_IS_RECORDED, &stream_id.to_be_bytes())
            .await
    }

    pub async fn write_set_buffer_length(&mut self, stream_id: u32, ms: u32) -> Result<()> {
        let mut b = stream_id.to_be_bytes().to_vec();
        b.extend_from_slice(&ms.to_be_bytes());
        self.write_user_control(EVENT_SET_BUFFER_LENGTH, &b).await
    }

    pub async fn write_ping_response(&mut self, timestamp: u32) -> Result<()> {
        self.write_user_control(EVENT_PING_RESPONSE, &timestamp.to_be_bytes())
            .await
    }

    async fn write_command(
        &mut self,
        csid: u32,
        stream_id: u32,
        name: &str,
        transaction_id: f64,
        object: Option<&AmfObject>,
        params: &[Amf0Value],
    ) -> Result<()> {
        let data = encode_command(name, transaction_id, object, params.iter())?;
        self.wr
            .write_message(
                csid,
                crate::protocol::MSG_TYPE_COMMAND_AMF0,
                stream_id,
                0,
                &[],
                &data,
            )
            .await
    }
}

/// `onStatus`/`_result` replies must carry `level == "status"`
fn check_level_status(cmd: &Command) -> Result<()> {
    let obj = cmd
        .param_object(0)
        .ok_or_else(|| Error::command("reply carries no info object"))?;
    match obj.get_string("level") {
        Some("status") => Ok(()),
        _ => {
            let code = obj.get_string("code").unwrap_or("unknown");
            Err(Error::command(format!("CodeInvalid({})", code)))
        }
    }
}

#[async_trait]
impl<S> PacketReader for Conn<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn read_packet(&mut self) -> Result<Packet> {
        self.prepare(Stage::CommandDone, Prepare::Reading).await?;
        loop {
            let tag = self.read_tag().await?;
            if let Some(pkt) = self.tag_to_packet.packet(&tag)? {
                return Ok(pkt);
            }
        }
    }
}

#[async_trait]
impl<S> PacketWriter for Conn<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn write_packet(&mut self, pkt: Packet) -> Result<()> {
        self.prepare(Stage::DataStart, Prepare::Writing).await?;
        for tag in self.packet_to_tag.tags(&pkt)? {
            self.write_tag(&tag).await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Conn::flush(self).await
    }
}
