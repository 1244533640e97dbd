use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject dependencies.
///
/// Every test gets its own server over a fresh in-memory ledger and a
/// scripted payment gateway. Injectable dependencies are
/// [`rocket::local::asynchronous::Client`], `crate::ledger::MemoryLedger`
/// and `crate::gateway::StubGateway`; the latter two share state with the
/// server, so tests can inspect and script them.
///
/// `#[backend_test(seeded)]` inserts `crate::model::db::ExampleBallot` first.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Seed the ledger if asked to.
    let maybe_seed = match parse_macro_input!(args as Option<Ident>) {
        None => quote! {},
        Some(arg) if arg == "seeded" => quote! {
            crate::model::db::ExampleBallot::insert(&ledger)
                .await
                .unwrap();
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `seeded`")
                .into_compile_error()
                .into();
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::ledger::MemoryLedger,
                crate::gateway::StubGateway,
            ) {
                let ledger = crate::ledger::MemoryLedger::new();
                let gateway = crate::gateway::StubGateway::new();
                #maybe_seed
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_ledger_and_gateway(
                        std::sync::Arc::new(ledger.clone()),
                        std::sync::Arc::new(gateway.clone()),
                    ),
                )
                .await
                .unwrap();
                (rocket_client, ledger, gateway)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, ledger, gateway) = setup().await;
                #new_name(#(#test_args),*).await
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut args = vec![];
    let mut seen = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(type_ident) = type_path.path.segments.last().map(|s| &s.ident) {
                    let arg = if type_ident == "Client" {
                        Some(quote! { rocket_client })
                    } else if type_ident == "MemoryLedger" {
                        Some(quote! { ledger.clone() })
                    } else if type_ident == "StubGateway" {
                        Some(quote! { gateway.clone() })
                    } else {
                        None
                    };
                    if let Some(arg) = arg {
                        if seen.contains(type_ident) {
                            return Err(syn::Error::new(
                                input.span(),
                                format!("Test cannot accept more than one `{type_ident}`"),
                            ));
                        }
                        seen.push(type_ident.clone());
                        args.push(arg);
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `ledger_ident: MemoryLedger` or `gateway_ident: StubGateway`",
        ));
    }

    Ok(args)
}
