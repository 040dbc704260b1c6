use std::fmt;
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeLevel {
    Info,
    Loading,
    Success,
    Error,
}

/// One user-facing notification line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Sends notices to whoever renders them. A silent notifier drops them.
#[derive(Clone, Debug, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        let notice = Notice {
            level,
            text: text.into(),
        };
        tracing::debug!(?notice.level, text = %notice.text, "notice");
        if let Some(tx) = &self.tx {
            // a closed receiver means nothing is rendering anymore
            let _ = tx.send(notice);
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.notify(NoticeLevel::Info, text)
    }

    pub fn loading(&self, text: impl Into<String>) {
        self.notify(NoticeLevel::Loading, text)
    }

    pub fn success(&self, text: impl Into<String>) {
        self.notify(NoticeLevel::Success, text)
    }

    pub fn error(&self, text: impl Into<String>) {
        self.notify(NoticeLevel::Error, text)
    }
}
