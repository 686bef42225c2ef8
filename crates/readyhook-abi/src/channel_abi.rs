//! Opening and signalling the controller's readiness channel.
//!
//! Both backends are strictly non-blocking once open: the queue descriptor
//! carries `O_NONBLOCK` and the semaphore increment uses `IPC_NOWAIT`.

use std::ffi::{CString, c_int, c_short};

use readyhook_core::{ChannelKind, ChannelSpec, READY_PAYLOAD};
use thiserror::Error;

use crate::errno_abi::abi_errno;

fn os_error(errno: &c_int) -> std::io::Error {
    std::io::Error::from_raw_os_error(*errno)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("mq_open({name}) failed: {}", os_error(.errno))]
    QueueOpen { name: String, errno: c_int },
    #[error("semget({key:#x}) failed: {}", os_error(.errno))]
    SemaphoreOpen { key: i32, errno: c_int },
    #[error("mq_send({name}) failed: {}", os_error(.errno))]
    QueueSend { name: String, errno: c_int },
    #[error("semop(+1) on key {key:#x} failed: {}", os_error(.errno))]
    SemaphorePost { key: i32, errno: c_int },
}

impl ChannelError {
    #[must_use]
    pub fn errno(&self) -> c_int {
        match self {
            Self::QueueOpen { errno, .. }
            | Self::SemaphoreOpen { errno, .. }
            | Self::QueueSend { errno, .. }
            | Self::SemaphorePost { errno, .. } => *errno,
        }
    }
}

/// An open readiness channel. Never closed: it lives as long as the process.
#[derive(Debug)]
pub enum ReadinessChannel {
    Queue { mqd: libc::mqd_t, name: String },
    Semaphore { semid: c_int, key: i32 },
}

impl ReadinessChannel {
    pub fn open(spec: &ChannelSpec) -> Result<Self, ChannelError> {
        match spec {
            ChannelSpec::Queue { name } => {
                let c_name = CString::new(name.as_bytes()).map_err(|_| ChannelError::QueueOpen {
                    name: name.clone(),
                    errno: libc::EINVAL,
                })?;
                // SAFETY: `c_name` is NUL-terminated; no O_CREAT, so no mode/attr varargs.
                let mqd = unsafe { libc::mq_open(c_name.as_ptr(), libc::O_WRONLY | libc::O_NONBLOCK) };
                if mqd == -1 {
                    return Err(ChannelError::QueueOpen {
                        name: name.clone(),
                        errno: abi_errno(),
                    });
                }
                Ok(Self::Queue {
                    mqd,
                    name: name.clone(),
                })
            }
            ChannelSpec::Semaphore { key } => {
                // SAFETY: plain syscall wrapper; nsems 0 attaches to an existing set.
                let semid = unsafe { libc::semget(*key as libc::key_t, 0, 0) };
                if semid == -1 {
                    return Err(ChannelError::SemaphoreOpen {
                        key: *key,
                        errno: abi_errno(),
                    });
                }
                Ok(Self::Semaphore { semid, key: *key })
            }
        }
    }

    /// Post one readiness unit. Never blocks.
    pub fn signal(&self) -> Result<(), ChannelError> {
        match self {
            Self::Queue { mqd, name } => {
                // SAFETY: payload is a static buffer of the given length.
                let rc = unsafe {
                    libc::mq_send(*mqd, READY_PAYLOAD.as_ptr().cast(), READY_PAYLOAD.len(), 0)
                };
                if rc == -1 {
                    return Err(ChannelError::QueueSend {
                        name: name.clone(),
                        errno: abi_errno(),
                    });
                }
            }
            Self::Semaphore { semid, key } => {
                let mut op = libc::sembuf {
                    sem_num: 0,
                    sem_op: 1,
                    sem_flg: libc::IPC_NOWAIT as c_short,
                };
                // SAFETY: `op` is one valid sembuf.
                if unsafe { libc::semop(*semid, &mut op, 1) } == -1 {
                    return Err(ChannelError::SemaphorePost {
                        key: *key,
                        errno: abi_errno(),
                    });
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Queue { .. } => ChannelKind::Queue,
            Self::Semaphore { .. } => ChannelKind::Semaphore,
        }
    }

    #[must_use]
    pub fn spec(&self) -> ChannelSpec {
        match self {
            Self::Queue { name, .. } => ChannelSpec::Queue { name: name.clone() },
            Self::Semaphore { key, .. } => ChannelSpec::Semaphore { key: *key },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_semaphore_reports_enoent() {
        // A key nobody is expected to own.
        let spec = ChannelSpec::Semaphore { key: 0x5eed_0f1d };
        let err = ReadinessChannel::open(&spec).unwrap_err();
        assert_eq!(err.errno(), libc::ENOENT);
        assert!(err.to_string().starts_with("semget(0x5eed0f1d) failed"));
    }

    #[test]
    fn missing_queue_reports_errno() {
        let spec = ChannelSpec::Queue {
            name: format!("/readyhook-absent-{}", std::process::id()),
        };
        let err = ReadinessChannel::open(&spec).unwrap_err();
        assert!(matches!(err, ChannelError::QueueOpen { .. }));
        assert_ne!(err.errno(), 0);
    }
}
