//! Outgoing mail capture.
//!
//! Nothing is ever sent. [`send`] appends to the thread's current
//! [`Mailbox`], which tests inspect directly or through the mail assertions.
//!
//! ```
//! use viewtest::mail::{self, Mailbox};
//!
//! let outbox = Mailbox::install();
//! mail::send_mail("Welcome", "Hi!", "noreply@example.com", ["alice@example.com"]);
//!
//! assert_eq!(outbox.len(), 1);
//! assert_eq!(outbox.emails()[0].subject, "Welcome");
//! ```

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

/// One captured email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Sender address.
    pub from: String,
    /// Recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Blind carbon-copy recipients.
    pub bcc: Vec<String>,
    /// Reply-To addresses.
    pub reply_to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// HTML alternative, if any.
    pub html: Option<String>,
    /// When the email was handed to the mailbox.
    pub sent_at: DateTime<Utc>,
}

impl Email {
    /// Starts building an email.
    pub fn builder(subject: impl Into<String>, body: impl Into<String>) -> EmailBuilder {
        EmailBuilder {
            email: Self {
                from: String::new(),
                to: Vec::new(),
                cc: Vec::new(),
                bcc: Vec::new(),
                reply_to: Vec::new(),
                subject: subject.into(),
                body: body.into(),
                html: None,
                sent_at: Utc::now(),
            },
        }
    }

    /// Returns every recipient: to, cc, then bcc.
    #[must_use]
    pub fn recipients(&self) -> Vec<&str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
            .collect()
    }
}

/// Builder for [`Email`].
#[must_use]
#[derive(Debug, Clone)]
pub struct EmailBuilder {
    email: Email,
}

impl EmailBuilder {
    /// Sets the sender.
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.email.from = address.into();
        self
    }

    /// Adds a recipient.
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.email.to.push(address.into());
        self
    }

    /// Adds a carbon-copy recipient.
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.email.cc.push(address.into());
        self
    }

    /// Adds a blind carbon-copy recipient.
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.email.bcc.push(address.into());
        self
    }

    /// Adds a Reply-To address.
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.email.reply_to.push(address.into());
        self
    }

    /// Sets the HTML alternative.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.email.html = Some(html.into());
        self
    }

    /// Finishes the email.
    #[must_use]
    pub fn build(self) -> Email {
        self.email
    }
}

/// An ordered, append-only collection of captured emails.
///
/// Cloning shares the same mailbox.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    emails: Arc<Mutex<Vec<Email>>>,
}

thread_local! {
    static CURRENT: RefCell<Mailbox> = RefCell::new(Mailbox::new());
}

impl Mailbox {
    /// Creates an empty mailbox that is not installed anywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mailbox [`send`] delivers to on this thread.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Installs a fresh mailbox on this thread until the guard is dropped.
    pub fn install() -> MailboxGuard {
        let mailbox = Self::new();
        let previous = CURRENT.with(|current| current.replace(mailbox.clone()));
        MailboxGuard {
            mailbox,
            previous: Some(previous),
            _not_send: PhantomData,
        }
    }

    /// Appends an email.
    pub fn deliver(&self, email: Email) {
        tracing::debug!(subject = %email.subject, recipients = email.recipients().len(), "Captured email");
        self.emails.lock().push(email);
    }

    /// Returns the number of captured emails.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.lock().len()
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.lock().is_empty()
    }

    /// Returns a copy of the captured emails, oldest first.
    #[must_use]
    pub fn emails(&self) -> Vec<Email> {
        self.emails.lock().clone()
    }

    /// Drops every captured email.
    pub fn clear(&self) {
        self.emails.lock().clear();
    }
}

/// Keeps a mailbox installed; see [`Mailbox::install`].
#[must_use = "the mailbox is uninstalled as soon as the guard is dropped"]
#[derive(Debug)]
pub struct MailboxGuard {
    mailbox: Mailbox,
    previous: Option<Mailbox>,
    _not_send: PhantomData<*const ()>,
}

impl Deref for MailboxGuard {
    type Target = Mailbox;

    fn deref(&self) -> &Mailbox {
        &self.mailbox
    }
}

impl Drop for MailboxGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let _ = CURRENT.try_with(|current| current.replace(previous));
        }
    }
}

/// Delivers `email` to the current mailbox.
pub fn send(email: Email) {
    Mailbox::current().deliver(email);
}

/// Sends a plain-text email and returns the number of emails sent.
pub fn send_mail<I, S>(subject: &str, body: &str, from: &str, to: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut builder = Email::builder(subject, body).from(from);
    for address in to {
        builder = builder.to(address);
    }
    send(builder.build());
    1
}

/// Field filter for captured emails. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailCriteria {
    /// Expected sender.
    pub from: Option<String>,
    /// Expected recipients, in order.
    pub to: Option<Vec<String>>,
    /// Expected carbon-copy recipients.
    pub cc: Option<Vec<String>>,
    /// Expected blind carbon-copy recipients.
    pub bcc: Option<Vec<String>>,
    /// Expected Reply-To addresses.
    pub reply_to: Option<Vec<String>>,
    /// Expected subject.
    pub subject: Option<String>,
    /// Expected plain-text body.
    pub body: Option<String>,
}

impl EmailCriteria {
    /// Creates criteria matching any email.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the sender.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Requires the recipients.
    #[must_use]
    pub fn to<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.to = Some(addresses.into_iter().map(Into::into).collect());
        self
    }

    /// Requires the carbon-copy recipients.
    #[must_use]
    pub fn cc<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cc = Some(addresses.into_iter().map(Into::into).collect());
        self
    }

    /// Requires the blind carbon-copy recipients.
    #[must_use]
    pub fn bcc<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bcc = Some(addresses.into_iter().map(Into::into).collect());
        self
    }

    /// Requires the Reply-To addresses.
    #[must_use]
    pub fn reply_to<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reply_to = Some(addresses.into_iter().map(Into::into).collect());
        self
    }

    /// Requires the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Requires the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns true if `email` satisfies every set field.
    #[must_use]
    pub fn matches(&self, email: &Email) -> bool {
        self.mismatches(email).is_empty()
    }

    /// Describes each set field `email` does not satisfy.
    #[must_use]
    pub fn mismatches(&self, email: &Email) -> Vec<String> {
        let mut out = Vec::new();
        check(&mut out, "from", self.from.as_ref(), &email.from);
        check(&mut out, "to", self.to.as_ref(), &email.to);
        check(&mut out, "cc", self.cc.as_ref(), &email.cc);
        check(&mut out, "bcc", self.bcc.as_ref(), &email.bcc);
        check(&mut out, "reply_to", self.reply_to.as_ref(), &email.reply_to);
        check(&mut out, "subject", self.subject.as_ref(), &email.subject);
        check(&mut out, "body", self.body.as_ref(), &email.body);
        out
    }
}

fn check<T: PartialEq + std::fmt::Debug>(out: &mut Vec<String>, field: &str, expected: Option<&T>, actual: &T) {
    if let Some(expected) = expected {
        if expected != actual {
            out.push(format!("{field}: expected {expected:?}, got {actual:?}"));
        }
    }
}
