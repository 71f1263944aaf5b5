// dkimsign – DKIM signing of outgoing email messages
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! [`LookupTxt`] for the Hickory DNS resolver.

use super::LookupTxt;
use hickory_resolver::{
    error::{ResolveError, ResolveErrorKind},
    Name, TokioAsyncResolver,
};
use std::{
    future::Future,
    io::{self, ErrorKind},
    pin::Pin,
};
use tracing::trace;

impl LookupTxt for TokioAsyncResolver {
    type Answer = Vec<io::Result<Vec<u8>>>;
    type Query<'a> = Pin<Box<dyn Future<Output = io::Result<Self::Answer>> + Send + 'a>>;

    fn lookup_txt(&self, domain: &str) -> Self::Query<'_> {
        let query_name = Name::from_ascii(domain)
            .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e.to_string()));

        Box::pin(async move {
            let lookup = self.txt_lookup(query_name?).await.map_err(resolve_error_to_io)?;

            // character-strings of one record are joined without separator
            let records: Vec<_> = lookup
                .iter()
                .map(|txt| Ok(txt.txt_data().concat()))
                .collect();

            trace!(count = records.len(), "received TXT records");

            Ok(records)
        })
    }
}

fn resolve_error_to_io(error: ResolveError) -> io::Error {
    let kind = match error.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => ErrorKind::NotFound,
        ResolveErrorKind::Timeout => ErrorKind::TimedOut,
        _ => ErrorKind::Other,
    };
    io::Error::new(kind, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_kinds() {
        let error = resolve_error_to_io(ResolveErrorKind::Timeout.into());
        assert_eq!(error.kind(), ErrorKind::TimedOut);

        let error = resolve_error_to_io(ResolveErrorKind::Message("no route").into());
        assert_eq!(error.kind(), ErrorKind::Other);
    }
}
