/// Contact-form field a validation error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Email,
    Message,
}

/// User-facing guard rejections.
///
/// `Display` is the message shown to the visitor. Provider details are never
/// part of it; they are logged where the error is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum GuardError {
    /// Email or password left blank.
    #[error("Email dan password harus diisi")]
    MissingCredentials,

    /// Email is not `local@domain.tld`.
    #[error("Format email tidak valid")]
    InvalidEmail,

    /// Credentials rejected by the provider. Never says which field was wrong.
    #[error("Email atau password salah. Sisa percobaan: {remaining}")]
    InvalidCredentials { remaining: u32 },

    /// This failure crossed the threshold and started a lockout.
    #[error("Terlalu banyak percobaan login gagal. Akun dikunci selama {} menit.", .lockout_secs.div_ceil(60))]
    LockoutStarted { lockout_secs: u64 },

    /// Attempt made while a lockout is active; the provider was not contacted.
    #[error("Terlalu banyak percobaan login. Coba lagi dalam {remaining_secs} detik.")]
    LockedOut { remaining_secs: u64 },

    #[error("Nama hanya boleh berisi huruf, spasi, tanda hubung, dan apostrof")]
    InvalidName,

    #[error("Pesan mengandung konten yang tidak diizinkan")]
    SpamDetected,

    #[error("Tunggu {remaining_secs} detik sebelum mengirim pesan lagi")]
    CooldownActive { remaining_secs: u64 },

    #[error("Gagal mengirim pesan. Silakan coba lagi.")]
    SubmitFailed,

    #[error("Gagal memperpanjang sesi. Silakan coba lagi.")]
    RefreshFailed,

    #[error("Gagal logout. Silakan coba lagi.")]
    SignOutFailed,

    /// No usable session.
    #[error("Sesi tidak valid atau telah berakhir")]
    Unauthenticated,

    /// Unexpected failure; detail is for logs only.
    #[error("Terjadi kesalahan. Silakan coba lagi.")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GuardError {
    /// The form field to highlight, for field-level validation errors.
    #[must_use]
    pub fn field(&self) -> Option<FormField> {
        match self {
            Self::InvalidEmail => Some(FormField::Email),
            Self::InvalidName => Some(FormField::Name),
            Self::SpamDetected => Some(FormField::Message),
            _ => None,
        }
    }

    /// Whether the error stems from throttling rather than bad input.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            Self::LockoutStarted { .. } | Self::LockedOut { .. } | Self::CooldownActive { .. }
        )
    }
}

impl From<crate::error::Error> for GuardError {
    fn from(e: crate::error::Error) -> Self {
        Self::Internal(e.to_string())
    }
}
