extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, PatType, Receiver};

/// Wraps an async method in a store transaction.
///
/// The method must take a `session: &mut Session` argument and return a
/// `Result` whose error type converts from `docstore::Error`. The body runs
/// between `start_transaction` and `commit_transaction`; a body error aborts
/// the transaction. A commit that fails with a write conflict reruns the
/// whole body, up to the session's retry limit, so callers never see
/// transient conflicts.
///
/// Arguments are passed to the rerun by value, so they must be references
/// or `Copy` types.
#[proc_macro_attribute]
pub fn tx(_args: TokenStream, input: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(input as ItemFn);
    let vis = &input_fn.vis;
    let block = &input_fn.block;
    let fn_name = &input_fn.sig.ident;
    let fn_args = &input_fn.sig.inputs;
    let fn_return = &input_fn.sig.output;

    let arg_list: Vec<_> = fn_args
        .iter()
        .map(|arg| match arg {
            FnArg::Typed(PatType { pat, .. }) => quote! { #pat },

            FnArg::Receiver(Receiver {
                reference,
                mutability,
                ..
            }) => {
                if reference.is_some() && mutability.is_some() {
                    quote!(self)
                } else if reference.is_some() {
                    quote!(&self)
                } else {
                    quote!(self)
                }
            }
        })
        .collect();

    let wrapped_fn_name = quote::format_ident!("{}_inner", fn_name);
    let gen = quote! {
        #vis async fn #wrapped_fn_name(#fn_args) #fn_return {
            #block
        }

        #vis async fn #fn_name(#fn_args) #fn_return {
            let mut attempt = 0;
            loop {
                session.start_transaction().await?;
                match Self::#wrapped_fn_name(#(#arg_list),*).await {
                    Ok(result) => match session.commit_transaction().await {
                        Ok(()) => break Ok(result),
                        Err(err) if err.is_conflict() && attempt < session.retry_limit() => {
                            attempt += 1;
                        }
                        Err(err) => break Err(err.into()),
                    },
                    Err(err) => {
                        session.abort_transaction().await?;
                        break Err(err);
                    }
                }
            }
        }
    };

    TokenStream::from(gen)
}
