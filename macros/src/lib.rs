//! Augment the development of blockcache with procedural macros.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn, LitStr};

/// Run a test function with a [tracing_subscriber](https://docs.rs/tracing-subscriber) that
/// writes to the test harness output.
///
/// The log level defaults to `DEBUG` and can be overridden with a string argument
/// (`#[test_traced("TRACE")]`). The crate using this macro must depend on `tracing` and
/// `tracing-subscriber` (with the `fmt` feature).
///
/// # Example
///
/// ```rust,ignore
/// use blockcache_macros::test_traced;
///
/// #[test_traced("INFO")]
/// fn test_logs() {
///     tracing::info!("visible when the test fails or runs with --nocapture");
/// }
/// ```
#[proc_macro_attribute]
pub fn test_traced(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let level = if attr.is_empty() {
        "DEBUG".to_string()
    } else {
        parse_macro_input!(attr as LitStr).value()
    };
    let level = match level.to_uppercase().as_str() {
        "TRACE" => quote! { tracing::Level::TRACE },
        "DEBUG" => quote! { tracing::Level::DEBUG },
        "INFO" => quote! { tracing::Level::INFO },
        "WARN" => quote! { tracing::Level::WARN },
        "ERROR" => quote! { tracing::Level::ERROR },
        other => {
            return syn::Error::new(
                proc_macro2::Span::call_site(),
                format!("unsupported log level: {other}"),
            )
            .to_compile_error()
            .into();
        }
    };

    let name = &input.sig.ident;
    let attrs = &input.attrs;
    let vis = &input.vis;
    let block = &input.block;

    let expanded = quote! {
        #[test]
        #(#attrs)*
        #vis fn #name() {
            let subscriber = tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(#level)
                .with_line_number(true)
                .finish();
            let dispatcher = tracing::Dispatch::new(subscriber);
            tracing::dispatcher::with_default(&dispatcher, || #block);
        }
    };
    TokenStream::from(expanded)
}
