//! Line-based NNTP command engine
//!
//! The minimal reader-side command loop: parse one CRLF line, dispatch to
//! the protocol adapter, write the response. Stateful context (selected
//! group, staged credentials, identity) lives on the per-connection
//! [`Session`].
//!
//! Not-found/denied answers use their protocol status codes; an
//! infrastructure failure is logged with the offending command and
//! answered with a generic 403.

use crate::adapter::{Adapter, Designator, Session, Wildmat};
use crate::extension::ArticleData;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

// Status lines, RFC 3977 / RFC 4643
const GREETING: &str = "201 NNTP Service Ready, posting prohibited";
const CLOSING: &str = "205 Connection closing";
const GROUP_SELECTED: u16 = 211;
const LIST_FOLLOWS: &str = "215 Newsgroups follow";
const ARTICLE_FOLLOWS: u16 = 220;
const HEAD_FOLLOWS: u16 = 221;
const BODY_FOLLOWS: u16 = 222;
const ARTICLE_EXISTS: u16 = 223;
const OVERVIEW_FOLLOWS: &str = "224 Overview information follows";
const NEW_ARTICLES_FOLLOW: &str = "230 List of new articles follows";
const NEW_GROUPS_FOLLOW: &str = "231 List of new newsgroups follows";
const AUTH_ACCEPTED: &str = "281 Authentication accepted";
const PASSWORD_REQUIRED: &str = "381 Password required";
const INTERNAL_FAULT: &str = "403 Internal fault";
const NO_SUCH_GROUP: &str = "411 No such newsgroup";
const NO_GROUP_SELECTED: &str = "412 No newsgroup selected";
const NO_CURRENT_ARTICLE: &str = "420 No current article selected";
const NO_SUCH_ARTICLE_NUMBER: &str = "423 No article with that number";
const NO_SUCH_ARTICLE_ID: &str = "430 No such article";
const AUTH_REJECTED: &str = "481 Authentication failed";
const AUTH_OUT_OF_SEQUENCE: &str = "482 Authentication commands issued out of sequence";
const UNKNOWN_COMMAND: &str = "500 Unknown command";
const SYNTAX_ERROR: &str = "501 Syntax error";

/// Which part of an article a fetch command wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Article,
    Head,
    Body,
    Stat,
}

impl FetchKind {
    const fn status(self) -> u16 {
        match self {
            Self::Article => ARTICLE_FOLLOWS,
            Self::Head => HEAD_FOLLOWS,
            Self::Body => BODY_FOLLOWS,
            Self::Stat => ARTICLE_EXISTS,
        }
    }
}

/// Per-connection command loop over the protocol adapter
pub struct CommandEngine {
    adapter: Arc<Adapter>,
}

impl CommandEngine {
    /// Create an engine over the shared adapter
    #[must_use]
    pub fn new(adapter: Arc<Adapter>) -> Self {
        Self { adapter }
    }

    /// Serve one connection until QUIT or EOF
    pub async fn serve<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);
        let mut session = Session::new();

        write_line(&mut writer, GREETING).await?;

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                debug!("client closed connection");
                return Ok(());
            }

            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                continue;
            }

            let (verb, args) = split_command(trimmed);

            if verb.eq_ignore_ascii_case("QUIT") {
                write_line(&mut writer, CLOSING).await?;
                return Ok(());
            }

            match self.dispatch(&mut session, &verb, args, &mut writer).await {
                Ok(()) => {}
                Err(e) => {
                    error!(command = %verb, error = %e, "command failed");
                    write_line(&mut writer, INTERNAL_FAULT).await?;
                }
            }
        }
    }

    async fn dispatch<W>(
        &self,
        session: &mut Session,
        verb: &str,
        args: &str,
        writer: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match verb.to_ascii_uppercase().as_str() {
            "CAPABILITIES" => {
                write_line(writer, "101 Capability list:").await?;
                write_multiline(writer, ["VERSION 2", "READER", "AUTHINFO USER"]).await?;
            }
            "MODE" => {
                // MODE READER is the only supported mode
                if args.eq_ignore_ascii_case("READER") {
                    write_line(writer, GREETING).await?;
                } else {
                    write_line(writer, SYNTAX_ERROR).await?;
                }
            }
            "GROUP" => self.cmd_group(session, args, writer).await?,
            "LIST" => self.cmd_list(session, args, writer).await?,
            "NEWGROUPS" => self.cmd_newgroups(session, args, writer).await?,
            "NEWNEWS" => self.cmd_newnews(session, args, writer).await?,
            "ARTICLE" => {
                self.cmd_fetch(session, args, FetchKind::Article, writer)
                    .await?
            }
            "HEAD" => self.cmd_fetch(session, args, FetchKind::Head, writer).await?,
            "BODY" => self.cmd_fetch(session, args, FetchKind::Body, writer).await?,
            "STAT" => self.cmd_fetch(session, args, FetchKind::Stat, writer).await?,
            "OVER" | "XOVER" => self.cmd_over(session, args, writer).await?,
            "AUTHINFO" => self.cmd_authinfo(session, args, writer).await?,
            _ => write_line(writer, UNKNOWN_COMMAND).await?,
        }
        Ok(())
    }

    async fn cmd_group<W>(&self, session: &mut Session, args: &str, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if args.is_empty() {
            return write_line(writer, SYNTAX_ERROR).await;
        }

        if self.adapter.select_group(session, args).await? {
            if let Some(view) = session.group() {
                let line = format!(
                    "{} {} {} {} {}",
                    GROUP_SELECTED, view.total, view.min_index, view.max_index, view.name
                );
                return write_line(writer, &line).await;
            }
        }

        write_line(writer, NO_SUCH_GROUP).await
    }

    async fn cmd_list<W>(&self, session: &mut Session, args: &str, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        // LIST, LIST ACTIVE, LIST ACTIVE <wildmat>
        let mut parts = args.split_ascii_whitespace();
        let keyword = parts.next().unwrap_or("ACTIVE");
        if !keyword.eq_ignore_ascii_case("ACTIVE") {
            return write_line(writer, SYNTAX_ERROR).await;
        }
        let pattern = parts.next().map(Wildmat::parse);

        let groups = self
            .adapter
            .list_groups(session, None, pattern.as_ref())
            .await?;

        write_line(writer, LIST_FOLLOWS).await?;
        let lines: Vec<String> = groups
            .iter()
            .map(|g| format!("{} {} {} n", g.name, g.max_index, g.min_index))
            .collect();
        write_multiline(writer, lines.iter().map(String::as_str)).await
    }

    async fn cmd_newgroups<W>(
        &self,
        session: &mut Session,
        args: &str,
        writer: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(since) = parse_since(args) else {
            return write_line(writer, SYNTAX_ERROR).await;
        };

        let groups = self.adapter.list_groups(session, Some(since), None).await?;

        write_line(writer, NEW_GROUPS_FOLLOW).await?;
        let lines: Vec<String> = groups
            .iter()
            .map(|g| format!("{} {} {} n", g.name, g.max_index, g.min_index))
            .collect();
        write_multiline(writer, lines.iter().map(String::as_str)).await
    }

    async fn cmd_newnews<W>(&self, session: &mut Session, args: &str, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some((pattern, rest)) = args.split_once(' ') else {
            return write_line(writer, SYNTAX_ERROR).await;
        };
        let Some(since) = parse_since(rest) else {
            return write_line(writer, SYNTAX_ERROR).await;
        };

        let pattern = Wildmat::parse(pattern);
        let articles = self
            .adapter
            .get_new_articles(session, since, Some(&pattern))
            .await?;

        write_line(writer, NEW_ARTICLES_FOLLOW).await?;
        let hostname = self.adapter.hostname();
        let lines: Vec<String> = articles
            .iter()
            .map(|a| format!("<{}@{}>", a.source, hostname))
            .collect();
        write_multiline(writer, lines.iter().map(String::as_str)).await
    }

    async fn cmd_fetch<W>(
        &self,
        session: &mut Session,
        args: &str,
        kind: FetchKind,
        writer: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let designator = if args.is_empty() {
            // No argument: the current article cursor
            match session.group() {
                Some(view) => Designator::Number(view.current_article),
                None => return write_line(writer, NO_GROUP_SELECTED).await,
            }
        } else {
            match Designator::parse(args) {
                Some(d) => d,
                None => return write_line(writer, SYNTAX_ERROR).await,
            }
        };

        if matches!(designator, Designator::Number(_)) && session.group().is_none() {
            return write_line(writer, NO_GROUP_SELECTED).await;
        }

        let Some(article) = self.adapter.get_article(session, designator).await? else {
            let status = match designator {
                Designator::MessageId(_) => NO_SUCH_ARTICLE_ID,
                Designator::Number(_) if args.is_empty() => NO_CURRENT_ARTICLE,
                Designator::Number(_) => NO_SUCH_ARTICLE_NUMBER,
            };
            return write_line(writer, status).await;
        };

        // A successful numeric fetch moves the cursor
        let number = match designator {
            Designator::Number(n) => {
                if let Some(view) = session.group_mut() {
                    view.current_article = n;
                }
                n
            }
            Designator::MessageId(_) => 0,
        };

        let message_id = format!("<{}@{}>", article.source, self.adapter.hostname());
        write_line(
            writer,
            &format!("{} {} {}", kind.status(), number, message_id),
        )
        .await?;

        match kind {
            FetchKind::Stat => {}
            FetchKind::Head => {
                let headers = self.adapter.build_headers(&article);
                write_multiline(writer, headers.iter().map(String::as_str)).await?;
            }
            FetchKind::Body => {
                write_body_block(writer, &self.adapter.build_body(&article)).await?;
            }
            FetchKind::Article => {
                let headers = self.adapter.build_headers(&article);
                for header in &headers {
                    write_line(writer, header).await?;
                }
                write_line(writer, "").await?;
                write_body_block(writer, &self.adapter.build_body(&article)).await?;
            }
        }
        Ok(())
    }

    async fn cmd_over<W>(&self, session: &mut Session, args: &str, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(view) = session.group() else {
            return write_line(writer, NO_GROUP_SELECTED).await;
        };

        let range = if args.is_empty() {
            Some((view.current_article, view.current_article))
        } else {
            parse_range(args)
        };
        let Some((from, to)) = range else {
            return write_line(writer, SYNTAX_ERROR).await;
        };

        let articles = self.adapter.get_range(session, from, to).await?;

        write_line(writer, OVERVIEW_FOLLOWS).await?;
        let lines: Vec<String> = articles
            .iter()
            .map(|a| self.overview_line(a))
            .collect();
        write_multiline(writer, lines.iter().map(String::as_str)).await
    }

    fn overview_line(&self, article: &ArticleData) -> String {
        let hostname = self.adapter.hostname();
        let body = self.adapter.build_body(article);
        let lines = body.split(|&b| b == b'\n').count();
        let references = article
            .reply_to
            .map(|parent| format!("<{}@{}>", parent, hostname))
            .unwrap_or_default();

        format!(
            "{}\t{}\t{}\t{}\t<{}@{}>\t{}\t{}\t{}",
            article.index,
            article.subject.as_deref().unwrap_or(""),
            article.from.as_deref().unwrap_or(""),
            article.date.to_rfc2822(),
            article.source,
            hostname,
            references,
            body.len(),
            lines
        )
    }

    async fn cmd_authinfo<W>(
        &self,
        session: &mut Session,
        args: &str,
        writer: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let (keyword, value) = split_command(args);

        if keyword.eq_ignore_ascii_case("USER") {
            if value.is_empty() {
                return write_line(writer, SYNTAX_ERROR).await;
            }
            session.stage_user(value);
            return write_line(writer, PASSWORD_REQUIRED).await;
        }

        if keyword.eq_ignore_ascii_case("PASS") {
            if !session.has_staged_user() {
                return write_line(writer, AUTH_OUT_OF_SEQUENCE).await;
            }
            session.stage_pass(value);

            return if self.adapter.authenticate(session).await? {
                info!(
                    user = session.user_info().map(|u| u.name.as_str()).unwrap_or(""),
                    "client authenticated"
                );
                write_line(writer, AUTH_ACCEPTED).await
            } else {
                write_line(writer, AUTH_REJECTED).await
            };
        }

        write_line(writer, SYNTAX_ERROR).await
    }
}

/// Split a command line into its first word and the remainder
fn split_command(line: &str) -> (String, &str) {
    match line.split_once(' ') {
        Some((verb, rest)) => (verb.to_string(), rest.trim()),
        None => (line.to_string(), ""),
    }
}

/// Parse "yyyymmdd hhmmss [GMT]" or "yymmdd hhmmss [GMT]"
fn parse_since(args: &str) -> Option<DateTime<Utc>> {
    let mut parts = args.split_ascii_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    if let Some(tz) = parts.next() {
        if !tz.eq_ignore_ascii_case("GMT") {
            return None;
        }
    }

    let date = match date.len() {
        8 => NaiveDate::parse_from_str(date, "%Y%m%d").ok()?,
        6 => {
            // Two-digit years pick the closest century, per RFC 3977
            let yy: i32 = date[..2].parse().ok()?;
            let year = if yy <= 70 { 2000 + yy } else { 1900 + yy };
            let month: u32 = date[2..4].parse().ok()?;
            let day: u32 = date[4..6].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)?
        }
        _ => return None,
    };

    let time = NaiveTime::parse_from_str(time, "%H%M%S").ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Parse an OVER range: "n", "n-", or "n-m"
fn parse_range(args: &str) -> Option<(u64, u64)> {
    match args.split_once('-') {
        None => {
            let n = args.parse().ok()?;
            Some((n, n))
        }
        Some((from, "")) => {
            let from = from.parse().ok()?;
            Some((from, u64::MAX))
        }
        Some((from, to)) => {
            let from = from.parse().ok()?;
            let to = to.parse().ok()?;
            Some((from, to))
        }
    }
}

async fn write_line<W>(writer: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Write a dot-stuffed multiline block, terminated with a lone dot
async fn write_multiline<W, I>(writer: &mut W, lines: I) -> Result<()>
where
    W: AsyncWrite + Unpin,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    for line in lines {
        let line = line.as_ref();
        if line.starts_with('.') {
            writer.write_all(b".").await?;
        }
        write_line(writer, line).await?;
    }
    writer.write_all(b".\r\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Write a body payload (already CRLF-joined base64 lines) as a block
async fn write_body_block<W>(writer: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if !body.is_empty() {
        writer.write_all(body).await?;
        writer.write_all(b"\r\n").await?;
    }
    writer.write_all(b".\r\n").await?;
    writer.flush().await?;
    Ok(())
}
