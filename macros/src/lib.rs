//! Procedural macros used to build the kernel's syscall gateway.
//!
//! The dispatch table in `crate::syscall` is generated from a flat list of
//! `id => name` pairs instead of being hand-maintained, so that adding a
//! syscall can never desynchronize the numeric id from the handler name.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
	braced, parse::Parse, parse::ParseStream, parse_macro_input, punctuated::Punctuated, Ident,
	LitInt, Token,
};

struct Entry {
	id: LitInt,
	name: Ident,
}

impl Parse for Entry {
	fn parse(input: ParseStream) -> syn::Result<Self> {
		let id: LitInt = input.parse()?;
		input.parse::<Token![=>]>()?;
		let name: Ident = input.parse()?;
		Ok(Self { id, name })
	}
}

struct Table {
	entries: Punctuated<Entry, Token![,]>,
}

impl Parse for Table {
	fn parse(input: ParseStream) -> syn::Result<Self> {
		let content;
		braced!(content in input);
		let entries = content.parse_terminated(Entry::parse, Token![,])?;
		Ok(Self { entries })
	}
}

/// Builds the syscall dispatch function from a table of `id => handler_mod`
/// entries.
///
/// Each `handler_mod` must be a sibling module of `crate::syscall` exposing a
/// `pub fn call(regs: &SyscallRegs) -> isize`. The macro expands to a
/// `pub fn dispatch(id: u32, regs: &SyscallRegs) -> isize` that matches on
/// `id`, logging entry/exit when the `strace` feature is enabled, and
/// returning `-ENOSYS` for unknown ids.
#[proc_macro]
pub fn syscall_table(input: TokenStream) -> TokenStream {
	let table = parse_macro_input!(input as Table);

	let arms = table.entries.iter().map(|Entry { id, name }| {
		let trace_enter = trace_tokens(name, true);
		let trace_exit = trace_tokens(name, false);
		quote! {
			#id => {
				#trace_enter
				let ret = #name::call(regs);
				#trace_exit
				ret
			}
		}
	});

	let expanded = quote! {
		/// Dispatches a syscall by numeric id, generated by [`macros::syscall_table`].
		pub fn dispatch(id: u32, regs: &SyscallRegs) -> isize {
			match id {
				#(#arms)*
				_ => -(crate::syscall::Errno::ENOSYS as isize),
			}
		}
	};
	expanded.into()
}

fn trace_tokens(name: &Ident, enter: bool) -> proc_macro2::TokenStream {
	let name_str = name.to_string();
	if cfg!(feature = "strace") {
		if enter {
			quote! { crate::log_info!("syscall {} enter", #name_str); }
		} else {
			quote! { crate::log_info!("syscall {} -> {}", #name_str, ret); }
		}
	} else {
		let _ = Span::call_site();
		quote! {}
	}
}
