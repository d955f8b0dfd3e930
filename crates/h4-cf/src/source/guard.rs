//! Scoped ownership of library handles.
//!
//! Dropping a guard releases its handle and logs a release failure, since
//! `Drop` cannot return one. On the success path callers use `close()` so a
//! failing detach or end call is propagated instead.

use h4_common::H4Result;
use tracing::warn;

use super::{EosApi, EosLibrary, Hdf4Library};

macro_rules! hdf4_guard {
    ($(#[$meta:meta])* $name:ident, $release:ident, $call:literal) => {
        $(#[$meta])*
        pub struct $name<'a, L: Hdf4Library + ?Sized> {
            lib: &'a L,
            id: i32,
            armed: bool,
        }

        impl<'a, L: Hdf4Library + ?Sized> $name<'a, L> {
            pub fn new(lib: &'a L, id: i32) -> Self {
                Self { lib, id, armed: true }
            }

            pub fn id(&self) -> i32 {
                self.id
            }

            /// Release now and report the outcome.
            pub fn close(mut self) -> H4Result<()> {
                self.armed = false;
                self.lib.$release(self.id)
            }
        }

        impl<L: Hdf4Library + ?Sized> Drop for $name<'_, L> {
            fn drop(&mut self) {
                if !self.armed {
                    return;
                }
                if let Err(e) = self.lib.$release(self.id) {
                    warn!(call = $call, id = self.id, error = %e, "Failed to release handle");
                }
            }
        }
    };
}

hdf4_guard!(
    /// An `SDstart` file id.
    SdFileGuard, sd_end, "SDend"
);
hdf4_guard!(
    /// An `SDselect` dataset id.
    SdsGuard, sd_end_access, "SDendaccess"
);
hdf4_guard!(
    /// An `Hopen` file id.
    HFileGuard, h_close, "Hclose"
);
hdf4_guard!(VgroupGuard, v_detach, "Vdetach");
hdf4_guard!(VdataGuard, vs_detach, "VSdetach");

/// A `GDopen`/`SWopen` file id.
///
/// A borrowed id (passed in by the caller) is never closed here.
pub struct EosFileGuard<'a, L: EosLibrary + ?Sized> {
    lib: &'a L,
    api: EosApi,
    id: i32,
    armed: bool,
}

impl<'a, L: EosLibrary + ?Sized> EosFileGuard<'a, L> {
    pub fn open(lib: &'a L, api: EosApi, path: &str) -> H4Result<Self> {
        let id = api.open(lib, path)?;
        Ok(Self {
            lib,
            api,
            id,
            armed: true,
        })
    }

    pub fn borrowed(lib: &'a L, api: EosApi, id: i32) -> Self {
        Self {
            lib,
            api,
            id,
            armed: false,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn close(mut self) -> H4Result<()> {
        if !self.armed {
            return Ok(());
        }
        self.armed = false;
        self.api.close(self.lib, self.id)
    }
}

impl<L: EosLibrary + ?Sized> Drop for EosFileGuard<'_, L> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.api.close(self.lib, self.id) {
            warn!(api = self.api.prefix(), id = self.id, error = %e, "Failed to close file");
        }
    }
}

/// A `GDattach`/`SWattach` object id.
pub struct EosObjectGuard<'a, L: EosLibrary + ?Sized> {
    lib: &'a L,
    api: EosApi,
    id: i32,
    armed: bool,
}

impl<'a, L: EosLibrary + ?Sized> EosObjectGuard<'a, L> {
    pub fn attach(lib: &'a L, api: EosApi, file_id: i32, name: &str) -> H4Result<Self> {
        let id = api.attach(lib, file_id, name)?;
        Ok(Self {
            lib,
            api,
            id,
            armed: true,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn close(mut self) -> H4Result<()> {
        self.armed = false;
        self.api.detach(self.lib, self.id)
    }
}

impl<L: EosLibrary + ?Sized> Drop for EosObjectGuard<'_, L> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.api.detach(self.lib, self.id) {
            warn!(api = self.api.prefix(), id = self.id, error = %e, "Failed to detach object");
        }
    }
}
