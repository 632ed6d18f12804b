//! OS objects behind segments and locks.
//!
//! Segments and locks share one flat name space, so a name means the same
//! object to every process whatever its working directory or environment.

#[cfg(unix)]
pub(crate) use self::posix::{open, unlink};

#[cfg(not(unix))]
pub(crate) use self::file::{open, unlink};

#[cfg(unix)]
mod posix {
    use crate::name::SegmentName;
    use rustix::fs::Mode;
    use rustix::shm;
    use std::fs::File;
    use std::io;

    pub(crate) fn open(name: &SegmentName, create: bool) -> io::Result<File> {
        let mut flags = shm::OFlags::RDWR;
        if create {
            flags |= shm::OFlags::CREATE;
        }
        // Subject to the process umask, like any other created file.
        let mode = Mode::RUSR | Mode::WUSR | Mode::RGRP | Mode::WGRP | Mode::ROTH | Mode::WOTH;

        let fd = shm::open(name.os_name().as_str(), flags, mode)?;
        Ok(File::from(fd))
    }

    pub(crate) fn unlink(name: &SegmentName) -> io::Result<()> {
        shm::unlink(name.os_name().as_str())?;
        Ok(())
    }
}

#[cfg(not(unix))]
mod file {
    use crate::name::SegmentName;
    use std::fs::{self, File, OpenOptions};
    use std::io;
    use std::path::PathBuf;

    fn object_dir() -> PathBuf {
        std::env::temp_dir().join("shmns-segments")
    }

    pub(crate) fn open(name: &SegmentName, create: bool) -> io::Result<File> {
        let dir = object_dir();
        if create {
            fs::create_dir_all(&dir)?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(dir.join(name.file_stem()))
    }

    pub(crate) fn unlink(name: &SegmentName) -> io::Result<()> {
        fs::remove_file(object_dir().join(name.file_stem()))
    }
}
