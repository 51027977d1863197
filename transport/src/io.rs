//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use std::io;

/// Raw, non-blocking byte transport underneath the protocol engines.
///
/// Implementations never block: a call that cannot make progress fails with an error of
/// kind [`io::ErrorKind::WouldBlock`]. A read of `Ok(0)` means the remote side closed the
/// stream.
pub trait Transport {
    /// Read whatever bytes the kernel has available.
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write as many bytes as the kernel accepts.
    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read urgent (out-of-band) data.
    ///
    /// Transports without an urgent channel always report would-block.
    fn raw_read_oob(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::ErrorKind::WouldBlock.into())
    }

    /// Shut down both directions before the transport is dropped.
    fn shutdown(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).raw_read(buf)
    }

    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).raw_write(buf)
    }

    fn raw_read_oob(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).raw_read_oob(buf)
    }

    fn shutdown(&mut self) {
        (**self).shutdown();
    }
}
